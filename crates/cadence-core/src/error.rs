use thiserror::Error;

use crate::document::PatchError;

#[derive(Debug, Error)]
pub enum CadenceError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM rate limited: {0}")]
    RateLimited(String),

    // Shared ToolPort errors
    #[error("{port} timed out after {timeout_secs}s")]
    Timeout { port: String, timeout_secs: u64 },

    #[error("{port} authentication failed: {message}")]
    Auth { port: String, message: String },

    #[error("{port} upstream error: {message}")]
    Upstream { port: String, message: String },

    // Arithmetic errors
    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow")]
    Overflow,

    // Document errors
    #[error("Document patch rejected: {0}")]
    Patch(#[from] PatchError),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CadenceError {
    /// Whether this error came from a ToolPort call. Tool failures are
    /// recovered inside the node that made the call and never end a run.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Self::LlmRequest(_)
                | Self::LlmStream(_)
                | Self::RateLimited(_)
                | Self::Timeout { .. }
                | Self::Auth { .. }
                | Self::Upstream { .. }
                | Self::MalformedExpression(_)
                | Self::DivisionByZero
                | Self::Overflow
        )
    }

    pub fn timeout(port: impl Into<String>, timeout_secs: u64) -> Self {
        Self::Timeout {
            port: port.into(),
            timeout_secs,
        }
    }

    pub fn upstream(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            port: port.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CadenceError>;
