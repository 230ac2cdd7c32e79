use thiserror::Error;

use crate::mcp::McpError;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("Cannot connect to AI service: {0}")]
    ConnectionFailed(String),

    #[error("Invalid or expired API key: {0}")]
    AuthFailed(String),

    /// Keeps "429" and "rate limit" in the message; the chat panel keys off both.
    #[error("429: API rate limit exceeded, please try again later ({0})")]
    RateLimited(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("AI service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("AI service response timeout")]
    Timeout,

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Tool server error: {0}")]
    Tool(#[from] McpError),

    #[error("Client disconnected")]
    Disconnected,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_connect() {
            LlmError::ConnectionFailed(err.to_string())
        } else {
            LlmError::Api {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
