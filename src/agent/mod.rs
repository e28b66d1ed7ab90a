//! Chat agent - the control loop
//!
//! AGENT → (TOOLS → AGENT)* → DONE
//!
//! The model decides every step: a reply with tool calls moves the loop to
//! TOOLS, a reply without them ends the turn. Only model failures abort a
//! turn; tool failures are fed back to the model as results.

pub mod prompt;

pub use prompt::{ensure_system_prompt, SYSTEM_PROMPT};

use crate::config::AppConfig;
use crate::error::AgentError;
use crate::gemini::{GeminiClient, ModelInvoker};
use crate::models::{ConversationState, Message, ToolCall};
use crate::tools::{ToolDispatcher, ToolRegistry};
use crate::Result;
use futures::Stream;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where the loop is within a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    /// Waiting on the model.
    Agent,
    /// Waiting on the results of these calls.
    Tools(Vec<ToolCall>),
    Done,
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub final_message: Message,
    pub model_calls: usize,
    pub tool_calls: usize,
}

pub struct ChatAgent {
    model: Arc<dyn ModelInvoker>,
    dispatcher: ToolDispatcher,
    max_iterations: Option<usize>,
}

impl ChatAgent {
    pub fn new(model: Arc<dyn ModelInvoker>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            dispatcher: ToolDispatcher::new(registry),
            max_iterations: None,
        }
    }

    /// Build the model client and tool registry from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let model = Arc::new(GeminiClient::from_config(config)?);
        let registry = Arc::new(ToolRegistry::from_config(config)?);

        Ok(Self::new(model, registry).with_max_iterations(config.max_iterations))
    }

    /// Cap on model calls per turn. `None` leaves the loop unbounded.
    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Run one turn to completion.
    ///
    /// On error the state keeps every message appended before the failure;
    /// a failed model call appends nothing.
    pub async fn run_turn(
        &self,
        state: &mut ConversationState,
        user_message: impl Into<String>,
    ) -> Result<TurnOutcome> {
        let start_time = Instant::now();
        begin_turn(state, user_message.into());

        let mut loop_state = LoopState::Agent;
        let mut model_calls = 0;
        let mut tool_calls = 0;

        loop {
            loop_state = match loop_state {
                LoopState::Agent => {
                    model_calls += 1;
                    self.agent_step(state, model_calls).await?
                }
                LoopState::Tools(calls) => {
                    tool_calls += calls.len();
                    for message in self.tools_step(&calls).await {
                        state.push(message);
                    }
                    LoopState::Agent
                }
                LoopState::Done => break,
            };
        }

        let final_message = state
            .last()
            .cloned()
            .ok_or_else(|| AgentError::ModelInvocation("Turn ended without a reply".to_string()))?;

        info!(
            model_calls,
            tool_calls,
            messages = state.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Turn complete"
        );

        Ok(TurnOutcome {
            final_message,
            model_calls,
            tool_calls,
        })
    }

    /// Same transitions as [`run_turn`](Self::run_turn), yielding a snapshot
    /// of the conversation after every append. A turn failure is yielded as
    /// the last item.
    pub fn stream_turn(
        &self,
        mut state: ConversationState,
        user_message: String,
    ) -> impl Stream<Item = Result<ConversationState>> + Send + '_ {
        async_stream::try_stream! {
            if ensure_system_prompt(&mut state) {
                yield state.clone();
            }
            state.push(Message::user(user_message));
            yield state.clone();

            let mut loop_state = LoopState::Agent;
            let mut model_calls = 0;

            loop {
                loop_state = match loop_state {
                    LoopState::Agent => {
                        model_calls += 1;
                        let next = self.agent_step(&mut state, model_calls).await?;
                        yield state.clone();
                        next
                    }
                    LoopState::Tools(calls) => {
                        for message in self.tools_step(&calls).await {
                            state.push(message);
                            yield state.clone();
                        }
                        LoopState::Agent
                    }
                    LoopState::Done => break,
                };
            }

            debug!(model_calls, messages = state.len(), "Streamed turn complete");
        }
    }

    /// AGENT: ask the model, append its reply, pick the next state.
    async fn agent_step(&self, state: &mut ConversationState, iteration: usize) -> Result<LoopState> {
        if let Some(max) = self.max_iterations {
            if iteration > max {
                warn!(max, "Model call limit reached for this turn");
                return Err(AgentError::IterationLimit(max));
            }
        }

        debug!(iteration, history = state.len(), "AGENT: invoking model");

        let mut reply = self
            .model
            .invoke(state.messages(), self.registry().descriptors())
            .await
            .map_err(|e| match e {
                fatal @ AgentError::ModelInvocation(_) => fatal,
                other => AgentError::ModelInvocation(other.to_string()),
            })?;
        reply.ensure_unique_call_ids();

        let next = if reply.requests_tools() {
            debug!(
                iteration,
                tools = ?reply.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "AGENT: model requested tools"
            );
            LoopState::Tools(reply.tool_calls.clone())
        } else {
            LoopState::Done
        };

        state.push(reply);
        Ok(next)
    }

    /// TOOLS: run the batch and turn each result into a tool message, in
    /// call order.
    async fn tools_step(&self, calls: &[ToolCall]) -> Vec<Message> {
        self.dispatcher
            .dispatch(calls)
            .await
            .into_iter()
            .map(|result| result.into_message())
            .collect()
    }
}

fn begin_turn(state: &mut ConversationState, user_message: String) {
    ensure_system_prompt(state);
    state.push(Message::user(user_message));
}
