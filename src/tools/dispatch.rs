//! Tool dispatcher
//!
//! Runs one batch of model-requested calls. Calls fan out concurrently and
//! results come back in call order, exactly one per call. Validation
//! failures, tool errors and panics stay inside the call that caused them.

use super::{ToolRegistry, ToolRequest};
use crate::models::{ToolCall, ToolOutput, ToolResult};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        debug!(calls = calls.len(), "Dispatching tool batch");
        join_all(calls.iter().map(|call| self.dispatch_one(call))).await
    }

    async fn dispatch_one(&self, call: &ToolCall) -> ToolResult {
        let request = match ToolRequest::parse(call) {
            Ok(request) => request.normalized(),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Rejected tool arguments");
                return ToolResult::new(
                    call,
                    ToolOutput::failure(&e, format!("Invalid arguments for {}", call.name)),
                );
            }
        };

        let start = Instant::now();

        let output = match AssertUnwindSafe(self.registry.execute(request))
            .catch_unwind()
            .await
        {
            Ok(output) => output,
            Err(_) => {
                warn!(tool = %call.name, call_id = %call.id, "Tool panicked");
                ToolOutput::failure(
                    "tool execution panicked",
                    format!("Failed to run {}", call.name),
                )
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if output.success {
            debug!(tool = %call.name, call_id = %call.id, elapsed_ms, "Tool succeeded");
        } else {
            warn!(
                tool = %call.name,
                call_id = %call.id,
                elapsed_ms,
                error = output.error.as_deref().unwrap_or_default(),
                "Tool failed"
            );
        }

        ToolResult::new(call, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::registry_with_fakes;
    use serde_json::json;

    #[tokio::test]
    async fn test_one_result_per_call_in_order() {
        let (registry, _) = registry_with_fakes().await;
        let dispatcher = ToolDispatcher::new(Arc::new(registry));

        let calls = vec![
            ToolCall::new("a", "get_stock_quote", json!({"symbol": "SLOW"})),
            ToolCall::new("b", "get_stock_quote", json!({"symbol": "AAPL"})),
            ToolCall::new("c", "get_user_watchlist", json!({"userId": "u1"})),
        ];

        let results = dispatcher.dispatch(&calls).await;
        let ids: Vec<_> = results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(results.iter().all(|r| r.success()));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_call() {
        let (registry, _) = registry_with_fakes().await;
        let dispatcher = ToolDispatcher::new(Arc::new(registry));

        let calls = vec![
            ToolCall::new("ok", "get_stock_quote", json!({"symbol": "AAPL"})),
            ToolCall::new("boom", "get_stock_profile", json!({"symbol": "FAIL"})),
            ToolCall::new("bad", "get_stock_quote", json!({"ticker": "AAPL"})),
            ToolCall::new("panic", "get_stock_quote", json!({"symbol": "PANIC"})),
            ToolCall::new("ok2", "get_market_news", json!({})),
        ];

        let results = dispatcher.dispatch(&calls).await;
        assert_eq!(results.len(), 5);
        assert!(results[0].success());
        assert!(!results[1].success());
        assert!(!results[2].success());
        assert!(results[2].error_message().unwrap().contains("symbol"));
        assert!(!results[3].success());
        assert!(results[4].success());
    }

    #[tokio::test]
    async fn test_symbols_normalized_before_provider() {
        let (registry, fakes) = registry_with_fakes().await;
        let dispatcher = ToolDispatcher::new(Arc::new(registry));

        let results = dispatcher
            .dispatch(&[ToolCall::new("q", "get_stock_quote", json!({"symbol": "aapl"}))])
            .await;

        assert!(results[0].success());
        assert_eq!(fakes.market.requested_symbols().await, vec!["AAPL".to_string()]);
        assert_eq!(results[0].output.data["quote"]["symbol"], "AAPL");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected_without_running() {
        let (registry, fakes) = registry_with_fakes().await;
        let dispatcher = ToolDispatcher::new(Arc::new(registry));

        let results = dispatcher
            .dispatch(&[ToolCall::new("x", "place_trade", json!({"symbol": "AAPL"}))])
            .await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].success());
        assert!(fakes.market.requested_symbols().await.is_empty());
    }
}
