//! Error types for the market chat agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Turn Errors
    // =============================

    /// Fatal to the turn: the model could not produce a message.
    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Iteration limit reached after {0} model calls")]
    IterationLimit(usize),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Whether this error ends the current turn (as opposed to being folded
    /// into a tool result).
    pub fn is_turn_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::ModelInvocation(_) | AgentError::IterationLimit(_)
        )
    }
}
