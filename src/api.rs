//! REST API server for the market chat agent
//!
//! The caller owns the conversation: every request carries the full message
//! history, the last user message being the new turn.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::ChatAgent;
use crate::error::AgentError;
use crate::models::{ConversationState, Message, Role};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

impl ChatRequest {
    /// Split into the prior conversation and the new user message.
    fn into_turn(self) -> Result<(ConversationState, String), AgentError> {
        let mut messages = self.messages;
        let index = messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .ok_or_else(|| AgentError::InvalidRequest("No user message found".into()))?;

        if index + 1 < messages.len() {
            warn!(
                dropped = messages.len() - index - 1,
                "Ignoring messages after the last user message"
            );
        }
        messages.truncate(index + 1);

        let user_message = messages
            .pop()
            .map(|m| m.content)
            .unwrap_or_default();
        if user_message.trim().is_empty() {
            return Err(AgentError::InvalidRequest("User message is empty".into()));
        }

        Ok((ConversationState::from_messages(messages), user_message))
    }
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatReply {
    answer: String,
    messages: Vec<Message>,
    model_calls: usize,
    tool_calls: usize,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<ChatAgent>,
}

fn error_status(error: &AgentError) -> StatusCode {
    match error {
        AgentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        e if e.is_turn_fatal() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let (mut conversation, user_message) = match req.into_turn() {
        Ok(turn) => turn,
        Err(e) => return (error_status(&e), Json(ApiResponse::error(e.to_string()))),
    };

    info!(history = conversation.len(), "Chat request");

    match state.agent.run_turn(&mut conversation, user_message).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(ChatReply {
                answer: outcome.final_message.content,
                messages: conversation.into_messages(),
                model_calls: outcome.model_calls,
                tool_calls: outcome.tool_calls,
            })),
        ),
        Err(e) => {
            warn!(error = %e, "Chat turn failed");
            (error_status(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// =============================
/// Streaming Chat Endpoint
/// =============================

/// Server-sent events: `state` after every appended message, then `done`
/// with the final answer, or `error` if the turn fails.
async fn chat_stream_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ApiResponse>)> {
    let (conversation, user_message) = req
        .into_turn()
        .map_err(|e| (error_status(&e), Json(ApiResponse::error(e.to_string()))))?;

    let agent = state.agent;
    let events = async_stream::stream! {
        let turn = agent.stream_turn(conversation, user_message);
        futures::pin_mut!(turn);

        let mut answer = String::new();
        while let Some(item) = turn.next().await {
            match item {
                Ok(snapshot) => {
                    if let Some(last) = snapshot.last() {
                        answer = last.content.clone();
                    }
                    yield Ok::<_, Infallible>(json_event("state", snapshot.messages()));
                }
                Err(e) => {
                    warn!(error = %e, "Streamed chat turn failed");
                    yield Ok(json_event("error", &serde_json::json!({ "error": e.to_string() })));
                    return;
                }
            }
        }

        yield Ok(json_event("done", &serde_json::json!({ "answer": answer })));
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn json_event<T: Serialize + ?Sized>(name: &str, data: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<ChatAgent>) -> Router {
    let state = ApiState { agent };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(agent: Arc<ChatAgent>, port: u16) -> crate::Result<()> {
    let router = create_router(agent);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
