//! `/api/call-mcp-tool`: status check and single tool calls for the panels.

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{Map, Value};
use shapekit_core::{McpClient, McpError, McpStatusResponse, ToolResponse};
use std::sync::Arc;

use crate::app::AppState;

pub async fn server_status(State(state): State<Arc<AppState>>) -> Json<McpStatusResponse> {
    let result = async {
        let mcp = McpClient::connect(&state.mcp_url).await?;
        let tools = mcp.list_tools().await;
        mcp.close().await;
        tools
    }
    .await;

    match result {
        Ok(tools) => Json(McpStatusResponse {
            success: true,
            message: Some("MCP server is running".to_string()),
            available_tools: Some(tools),
            error: None,
        }),
        Err(e) => {
            tracing::warn!("MCP status check failed: {}", e);
            Json(McpStatusResponse {
                success: false,
                message: None,
                available_tools: None,
                error: Some(e.to_string()),
            })
        }
    }
}

pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<ToolResponse>) {
    let tool_name = match body.get("toolName").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ToolResponse::failed(None, "toolName is required")),
            )
        }
    };
    let parameters = match body.get("parameters") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    tracing::info!(tool = %tool_name, "calling MCP tool");

    match invoke(&state.mcp_url, &tool_name, parameters).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(e) => {
            let status = if e.is_unreachable() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            tracing::error!(tool = %tool_name, "tool call failed: {}", e);
            (status, Json(ToolResponse::failed(Some(&tool_name), e.to_string())))
        }
    }
}

async fn invoke(
    mcp_url: &str,
    tool_name: &str,
    parameters: Map<String, Value>,
) -> Result<ToolResponse, McpError> {
    let mcp = McpClient::connect(mcp_url).await?;
    let result = mcp.call_tool(tool_name, Value::Object(parameters)).await;
    mcp.close().await;
    let result = result?;

    if result.is_error {
        return Ok(ToolResponse::failed(Some(tool_name), result.text()));
    }
    Ok(ToolResponse::ok(tool_name, result.content))
}
