//! Model Context Protocol client for the Shape tool server.
//!
//! Speaks the streamable HTTP transport: JSON-RPC over POST, replies as plain
//! JSON or as an SSE stream, session tracked through `Mcp-Session-Id`.

mod client;
mod protocol;

pub use client::McpClient;
pub use protocol::{
    CallToolResult, InitializeResult, ListToolsResult, McpErrorBody, McpRequest, McpResponse,
    McpTool, ServerInfo, ToolAnnotations, ToolContent, PROTOCOL_VERSION, SESSION_HEADER,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Cannot reach MCP server: {0}")]
    Unreachable(String),

    #[error("MCP request timed out")]
    Timeout,

    #[error("MCP server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid MCP response: {0}")]
    Protocol(String),
}

impl McpError {
    /// The server could not be contacted at all, as opposed to answering with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, McpError::Unreachable(_) | McpError::Timeout)
    }
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            McpError::Timeout
        } else if err.is_decode() {
            McpError::Protocol(err.to_string())
        } else {
            McpError::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Protocol(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, McpError>;
