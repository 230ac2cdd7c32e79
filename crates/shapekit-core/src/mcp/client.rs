use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::protocol::{
    CallToolResult, InitializeResult, ListToolsResult, McpRequest, McpResponse, McpTool,
    PROTOCOL_VERSION, SESSION_HEADER,
};
use super::{McpError, Result};
use crate::sse::decode_stream;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LIST_PAGES: usize = 50;

#[derive(Debug)]
pub struct McpClient {
    client: Client,
    url: String,
    timeout: Duration,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            timeout: DEFAULT_TIMEOUT,
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a client and complete the initialize handshake.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Self::new(url);
        client.initialize().await?;
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session_id.lock().await.clone()
    }

    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "shapekit",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let result = self.request("initialize", params).await?;
        let init: InitializeResult = serde_json::from_value(result)?;
        tracing::info!(
            server = %init.server_info.name,
            version = %init.server_info.version,
            protocol = %init.protocol_version,
            "connected to MCP server"
        );

        self.notify("notifications/initialized").await?;
        Ok(init)
    }

    /// All tools, following `nextCursor` until the server stops paginating.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let page: ListToolsResult = serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(count = tools.len(), "listed MCP tools");
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        let params = json!({ "name": name, "arguments": arguments });

        let result = self.request("tools/call", params).await?;
        let result: CallToolResult = serde_json::from_value(result)?;
        if result.is_error {
            tracing::warn!(tool = name, "tool reported an error: {}", result.text());
        }
        Ok(result)
    }

    /// End the session. Failures are logged, there is nothing left to do with them.
    pub async fn close(&self) {
        let session = self.session_id.lock().await.take();
        let Some(session) = session else {
            return;
        };

        let result = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, &session)
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(session = %session, "closed MCP session")
            }
            // 405: the server does not let clients end sessions.
            Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => {}
            Ok(response) => tracing::debug!("MCP session close returned {}", response.status()),
            Err(e) => tracing::debug!("MCP session close failed: {}", e),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = McpRequest::call(id, method, params);

        let response = self.post(&request).await?;
        let reply = self.read_reply(response, id).await?;

        if let Some(err) = reply.error {
            return Err(McpError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        reply
            .result
            .ok_or_else(|| McpError::Protocol(format!("{} reply has neither result nor error", method)))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        self.post(&McpRequest::notification(method)).await?;
        Ok(())
    }

    async fn post(&self, request: &McpRequest) -> Result<Response> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .timeout(self.timeout)
            .json(request);

        if let Some(session) = self.session_id.lock().await.as_deref() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock().await = Some(session.to_string());
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(method = request.method(), status, "MCP request rejected");
            return Err(McpError::Status { status, body });
        }

        Ok(response)
    }

    async fn read_reply(&self, response: Response, id: u64) -> Result<McpResponse> {
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/event-stream"))
            .unwrap_or(false);

        if !is_stream {
            let body: Value = response.json().await?;
            return match_reply(body, id)
                .ok_or_else(|| McpError::Protocol(format!("no reply with id {} in response body", id)));
        }

        let mut events = Box::pin(decode_stream(Box::pin(response.bytes_stream())));
        while let Some(event) = events.next().await {
            let event = event?;
            let body: Value = match serde_json::from_str(&event.data) {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("skipping non-JSON MCP event: {}", e);
                    continue;
                }
            };
            // Server-initiated requests and notifications can share the stream.
            if let Some(reply) = match_reply(body, id) {
                return Ok(reply);
            }
        }

        Err(McpError::Protocol(format!("stream ended before reply {}", id)))
    }
}

/// Find the response for `id` in a single message or a batch.
fn match_reply(body: Value, id: u64) -> Option<McpResponse> {
    let candidates = match body {
        Value::Array(items) => items,
        other => vec![other],
    };

    candidates.into_iter().find_map(|item| {
        let response: McpResponse = serde_json::from_value(item).ok()?;
        let matches = response.id.as_ref().and_then(Value::as_u64) == Some(id);
        let is_reply = response.result.is_some() || response.error.is_some();
        (matches && is_reply).then_some(response)
    })
}
