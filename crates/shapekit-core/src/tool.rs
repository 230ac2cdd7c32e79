//! Envelopes exchanged between the panels and `/api/call-mcp-tool`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mcp::{McpTool, ToolContent};

/// Body of `POST /api/call-mcp-tool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl CallToolRequest {
    pub fn new(tool_name: &str, parameters: Value) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            tool_name: tool_name.to_string(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
}

/// Response of `POST /api/call-mcp-tool`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ToolResponse {
    pub fn ok(tool_name: &str, content: Vec<ToolContent>) -> Self {
        Self {
            success: true,
            result: Some(ToolResult { content }),
            error: None,
            tool_name: Some(tool_name.to_string()),
        }
    }

    pub fn failed(tool_name: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            tool_name: tool_name.map(str::to_string),
        }
    }

    /// Text of the first content block, if there is one.
    pub fn first_text(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| r.content.first())
            .and_then(|c| c.text.as_deref())
    }
}

/// Response of `GET /api/call-mcp-tool`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpStatusResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_tools: Option<Vec<McpTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
