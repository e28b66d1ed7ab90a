//! Tool registry, argument validation and the six market tools
//!
//! The tool set is fixed: one [`ToolKind`] variant per tool. Model-supplied
//! arguments are parsed into a typed [`ToolRequest`] before any tool body
//! runs; a mismatch becomes a [`ToolValidationError`] value.

pub mod dispatch;
pub mod market;
pub mod watchlist;
pub mod web;

pub use dispatch::ToolDispatcher;

use crate::config::AppConfig;
use crate::error::AgentError;
use crate::models::{ToolCall, ToolDescriptor, ToolOutput};
use crate::providers::{
    ContentFetcher, FinnhubClient, FirecrawlClient, MarketDataProvider, PgWatchlistStore,
    WatchlistStore,
};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

//
// ================= Tool kinds =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    UserWatchlist,
    StockProfile,
    StockQuote,
    MarketNews,
    WebScrape,
    FinancialAnalysis,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::UserWatchlist,
        ToolKind::StockProfile,
        ToolKind::StockQuote,
        ToolKind::MarketNews,
        ToolKind::WebScrape,
        ToolKind::FinancialAnalysis,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::UserWatchlist => "get_user_watchlist",
            ToolKind::StockProfile => "get_stock_profile",
            ToolKind::StockQuote => "get_stock_quote",
            ToolKind::MarketNews => "get_market_news",
            ToolKind::WebScrape => "web_scrape",
            ToolKind::FinancialAnalysis => "financial_analysis",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::UserWatchlist => {
                "Get the current user's stock watchlist. Requires userId or email to identify the user."
            }
            ToolKind::StockProfile => {
                "Get detailed company profile information for a stock symbol including company name, industry, market cap, etc."
            }
            ToolKind::StockQuote => {
                "Get current stock price, change, and other quote data for a stock symbol"
            }
            ToolKind::MarketNews => {
                "Get latest market news. Can filter by specific stock symbols or get general market news."
            }
            ToolKind::WebScrape => {
                "Scrape web content from URLs. Useful for getting financial news, analysis, and market data from external sources."
            }
            ToolKind::FinancialAnalysis => {
                "Search and scrape financial analysis websites for detailed information about stocks, market trends, and investment insights."
            }
        }
    }

    pub fn input_schema(self) -> Value {
        let symbol = json!({
            "type": "object",
            "properties": {
                "symbol": {"type": "string", "description": "Stock symbol (e.g., AAPL, TSLA)"}
            },
            "required": ["symbol"]
        });

        match self {
            ToolKind::UserWatchlist => json!({
                "type": "object",
                "properties": {
                    "userId": {"type": "string", "description": "User ID to get watchlist for"},
                    "email": {"type": "string", "description": "User email to get watchlist for (alternative to userId)"}
                }
            }),
            ToolKind::StockProfile | ToolKind::StockQuote => symbol,
            ToolKind::MarketNews => json!({
                "type": "object",
                "properties": {
                    "symbols": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Array of stock symbols to get news for (optional)"
                    }
                }
            }),
            ToolKind::WebScrape => json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "URL to scrape content from"}
                },
                "required": ["url"]
            }),
            ToolKind::FinancialAnalysis => json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query or topic for financial analysis"},
                    "symbol": {"type": "string", "description": "Specific stock symbol to analyze"}
                },
                "required": ["query"]
            }),
        }
    }

    pub fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name(),
            description: self.description(),
            input_schema: self.input_schema(),
        }
    }
}

//
// ================= Validation =================
//

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid arguments for {tool}: {reason}")]
pub struct ToolValidationError {
    pub tool: String,
    pub reason: String,
}

impl ToolValidationError {
    fn new(tool: &str, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WatchlistArgs {
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SymbolArgs {
    pub symbol: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NewsArgs {
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScrapeArgs {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AnalysisArgs {
    pub query: String,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// A validated tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    UserWatchlist(WatchlistArgs),
    StockProfile(SymbolArgs),
    StockQuote(SymbolArgs),
    MarketNews(NewsArgs),
    WebScrape(ScrapeArgs),
    FinancialAnalysis(AnalysisArgs),
}

impl ToolRequest {
    /// Check a model-issued call against its tool's input contract.
    pub fn parse(call: &ToolCall) -> std::result::Result<Self, ToolValidationError> {
        let kind = ToolKind::from_name(&call.name)
            .ok_or_else(|| ToolValidationError::new(&call.name, "unknown tool"))?;

        // A missing argument object is an empty one.
        let arguments = if call.arguments.is_null() {
            json!({})
        } else {
            call.arguments.clone()
        };
        if !arguments.is_object() {
            return Err(ToolValidationError::new(
                kind.name(),
                "arguments must be a JSON object",
            ));
        }

        let request = match kind {
            ToolKind::UserWatchlist => ToolRequest::UserWatchlist(decode(kind, arguments)?),
            ToolKind::StockProfile => {
                ToolRequest::StockProfile(require_symbol(kind, decode(kind, arguments)?)?)
            }
            ToolKind::StockQuote => {
                ToolRequest::StockQuote(require_symbol(kind, decode(kind, arguments)?)?)
            }
            ToolKind::MarketNews => ToolRequest::MarketNews(decode(kind, arguments)?),
            ToolKind::WebScrape => {
                let args: ScrapeArgs = decode(kind, arguments)?;
                match reqwest::Url::parse(args.url.trim()) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                    _ => {
                        return Err(ToolValidationError::new(
                            kind.name(),
                            format!("'{}' is not an http(s) URL", args.url),
                        ))
                    }
                }
                ToolRequest::WebScrape(args)
            }
            ToolKind::FinancialAnalysis => {
                let args: AnalysisArgs = decode(kind, arguments)?;
                if args.query.trim().is_empty() {
                    return Err(ToolValidationError::new(kind.name(), "query must not be empty"));
                }
                ToolRequest::FinancialAnalysis(args)
            }
        };

        Ok(request)
    }

    /// Uppercase symbols and drop blank optional fields.
    pub fn normalized(self) -> Self {
        match self {
            ToolRequest::UserWatchlist(args) => ToolRequest::UserWatchlist(WatchlistArgs {
                user_id: non_blank(args.user_id),
                email: non_blank(args.email),
            }),
            ToolRequest::StockProfile(args) => ToolRequest::StockProfile(SymbolArgs {
                symbol: normalize_symbol(&args.symbol),
            }),
            ToolRequest::StockQuote(args) => ToolRequest::StockQuote(SymbolArgs {
                symbol: normalize_symbol(&args.symbol),
            }),
            ToolRequest::MarketNews(args) => {
                let symbols = args
                    .symbols
                    .map(|list| {
                        let mut seen = HashSet::new();
                        list.iter()
                            .map(|s| normalize_symbol(s))
                            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
                            .collect::<Vec<_>>()
                    })
                    .filter(|list| !list.is_empty());
                ToolRequest::MarketNews(NewsArgs { symbols })
            }
            ToolRequest::WebScrape(args) => ToolRequest::WebScrape(ScrapeArgs {
                url: args.url.trim().to_string(),
            }),
            ToolRequest::FinancialAnalysis(args) => {
                ToolRequest::FinancialAnalysis(AnalysisArgs {
                    query: args.query.trim().to_string(),
                    symbol: non_blank(args.symbol).map(|s| normalize_symbol(&s)),
                })
            }
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRequest::UserWatchlist(_) => ToolKind::UserWatchlist,
            ToolRequest::StockProfile(_) => ToolKind::StockProfile,
            ToolRequest::StockQuote(_) => ToolKind::StockQuote,
            ToolRequest::MarketNews(_) => ToolKind::MarketNews,
            ToolRequest::WebScrape(_) => ToolKind::WebScrape,
            ToolRequest::FinancialAnalysis(_) => ToolKind::FinancialAnalysis,
        }
    }
}

fn decode<T: DeserializeOwned>(
    kind: ToolKind,
    arguments: Value,
) -> std::result::Result<T, ToolValidationError> {
    serde_json::from_value(arguments).map_err(|e| ToolValidationError::new(kind.name(), e.to_string()))
}

fn require_symbol(
    kind: ToolKind,
    args: SymbolArgs,
) -> std::result::Result<SymbolArgs, ToolValidationError> {
    if args.symbol.trim().is_empty() {
        Err(ToolValidationError::new(kind.name(), "symbol must not be empty"))
    } else {
        Ok(args)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

//
// ================= Registry =================
//

/// External collaborators the tools call. `None` means unconfigured; the
/// affected tools fail at call time.
#[derive(Clone)]
pub struct ToolBackends {
    pub watchlist: Option<Arc<dyn WatchlistStore>>,
    pub market: Option<Arc<dyn MarketDataProvider>>,
    pub fetcher: Option<Arc<dyn ContentFetcher>>,
    pub analysis_max_sources: usize,
}

impl Default for ToolBackends {
    fn default() -> Self {
        Self {
            watchlist: None,
            market: None,
            fetcher: None,
            analysis_max_sources: web::DEFAULT_ANALYSIS_SOURCES,
        }
    }
}

/// Immutable tool configuration, built once at startup.
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    backends: ToolBackends,
}

impl ToolRegistry {
    pub fn new(backends: ToolBackends) -> Self {
        Self {
            descriptors: ToolKind::ALL.iter().map(|kind| kind.descriptor()).collect(),
            backends,
        }
    }

    /// Registry with every collaborator missing.
    pub fn unconfigured() -> Self {
        Self::new(ToolBackends::default())
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let watchlist: Option<Arc<dyn WatchlistStore>> = match &config.database_url {
            Some(url) => match PgWatchlistStore::connect_lazy(url) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    warn!("Watchlist store unavailable: {}", e);
                    None
                }
            },
            None => None,
        };

        let market: Option<Arc<dyn MarketDataProvider>> = match &config.finnhub_api_key {
            Some(key) => Some(Arc::new(FinnhubClient::new(
                key.clone(),
                &config.finnhub_base_url,
                config.http_timeout,
            )?)),
            None => None,
        };

        let fetcher: Option<Arc<dyn ContentFetcher>> = match &config.firecrawl_api_key {
            Some(key) => Some(Arc::new(FirecrawlClient::new(
                key.clone(),
                &config.firecrawl_base_url,
                config.http_timeout,
            )?)),
            None => None,
        };

        let registry = Self::new(ToolBackends {
            watchlist,
            market,
            fetcher,
            analysis_max_sources: config.analysis_max_sources,
        });
        registry.validate()?;

        info!(
            watchlist = registry.backends.watchlist.is_some(),
            market_data = registry.backends.market.is_some(),
            content_fetch = registry.backends.fetcher.is_some(),
            "Tool registry ready"
        );

        Ok(registry)
    }

    /// Names are unique and every schema is an object schema.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for descriptor in &self.descriptors {
            if !names.insert(descriptor.name) {
                return Err(AgentError::Configuration(format!(
                    "Duplicate tool name: {}",
                    descriptor.name
                )));
            }
            if descriptor.input_schema.get("type") != Some(&json!("object")) {
                return Err(AgentError::Configuration(format!(
                    "Tool {} must take an object",
                    descriptor.name
                )));
            }
        }
        Ok(())
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<ToolKind> {
        ToolKind::from_name(name)
    }

    /// Run a validated request. Never fails: errors come back as a failed
    /// [`ToolOutput`].
    pub async fn execute(&self, request: ToolRequest) -> ToolOutput {
        let backends = &self.backends;
        match request {
            ToolRequest::UserWatchlist(args) => {
                watchlist::get_user_watchlist(backends.watchlist.as_deref(), &args).await
            }
            ToolRequest::StockProfile(args) => {
                market::get_stock_profile(backends.market.as_deref(), &args.symbol).await
            }
            ToolRequest::StockQuote(args) => {
                market::get_stock_quote(backends.market.as_deref(), &args.symbol).await
            }
            ToolRequest::MarketNews(args) => {
                market::get_market_news(backends.market.as_deref(), args.symbols.as_deref()).await
            }
            ToolRequest::WebScrape(args) => {
                web::web_scrape(backends.fetcher.as_deref(), &args.url).await
            }
            ToolRequest::FinancialAnalysis(args) => {
                web::financial_analysis(
                    backends.fetcher.as_deref(),
                    &args,
                    backends.analysis_max_sources,
                )
                .await
            }
        }
    }
}

/// Error for a tool whose collaborator is not configured.
pub(crate) fn not_configured(what: &str) -> AgentError {
    AgentError::Configuration(format!("{} not configured", what))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall::new("call_1", name, arguments)
    }

    #[test]
    fn test_registry_exposes_six_unique_tools() {
        let registry = ToolRegistry::unconfigured();
        assert_eq!(registry.descriptors().len(), 6);
        assert!(registry.validate().is_ok());
        for kind in ToolKind::ALL {
            assert_eq!(registry.get(kind.name()), Some(kind));
        }
        assert_eq!(registry.get("delete_everything"), None);
    }

    #[test]
    fn test_parse_valid_requests() {
        let request = ToolRequest::parse(&call("get_stock_quote", json!({"symbol": "aapl"}))).unwrap();
        assert_eq!(request.kind(), ToolKind::StockQuote);

        let request = ToolRequest::parse(&call("get_market_news", Value::Null)).unwrap();
        assert_eq!(request, ToolRequest::MarketNews(NewsArgs { symbols: None }));

        let request = ToolRequest::parse(&call(
            "financial_analysis",
            json!({"query": "earnings", "symbol": "nvda", "extra": true}),
        ))
        .unwrap();
        assert_eq!(request.kind(), ToolKind::FinancialAnalysis);
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        let cases = vec![
            call("get_stock_quote", json!({})),
            call("get_stock_quote", json!({"symbol": 42})),
            call("get_stock_profile", json!({"symbol": "  "})),
            call("get_market_news", json!({"symbols": "AAPL"})),
            call("web_scrape", json!({"url": "ftp://example.com"})),
            call("web_scrape", json!(["https://example.com"])),
            call("financial_analysis", json!({"symbol": "AAPL"})),
            call("unknown_tool", json!({})),
        ];

        for bad in cases {
            let err = ToolRequest::parse(&bad).unwrap_err();
            assert_eq!(err.tool, bad.name);
            assert!(!err.reason.is_empty());
        }
    }

    #[test]
    fn test_normalization_uppercases_symbols() {
        let request = ToolRequest::parse(&call("get_stock_quote", json!({"symbol": " aapl "})))
            .unwrap()
            .normalized();
        assert_eq!(
            request,
            ToolRequest::StockQuote(SymbolArgs {
                symbol: "AAPL".into()
            })
        );

        let request = ToolRequest::parse(&call(
            "get_market_news",
            json!({"symbols": ["tsla", "TSLA", " ", "msft"]}),
        ))
        .unwrap()
        .normalized();
        assert_eq!(
            request,
            ToolRequest::MarketNews(NewsArgs {
                symbols: Some(vec!["TSLA".into(), "MSFT".into()])
            })
        );

        let request = ToolRequest::parse(&call("get_user_watchlist", json!({"userId": "", "email": "a@b.c"})))
            .unwrap()
            .normalized();
        assert_eq!(
            request,
            ToolRequest::UserWatchlist(WatchlistArgs {
                user_id: None,
                email: Some("a@b.c".into())
            })
        );
    }

    #[tokio::test]
    async fn test_unconfigured_tools_fail_at_call_time() {
        let registry = ToolRegistry::unconfigured();
        let output = registry
            .execute(ToolRequest::StockQuote(SymbolArgs {
                symbol: "AAPL".into(),
            }))
            .await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("not configured"));
    }
}
