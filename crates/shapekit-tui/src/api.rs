//! HTTP client for the kit server's `/api` routes.

use anyhow::{anyhow, bail, Result};
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use shapekit_core::sse::decode_stream;
use shapekit_core::{CallToolRequest, ChatMessage, McpStatusResponse, ToolResponse, UiStreamEvent};

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// Non-2xx responses fail the request, with the server's `error` text when it sent one.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string));

    match detail {
        Some(detail) => bail!("HTTP error! status: {} ({})", status.as_u16(), detail),
        None => bail!("HTTP error! status: {}", status.as_u16()),
    }
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn status(&self) -> Result<McpStatusResponse> {
        let response = self
            .client
            .get(format!("{}/api/call-mcp-tool", self.base_url))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn call_tool(&self, tool_name: &str, parameters: Value) -> Result<ToolResponse> {
        let request = CallToolRequest::new(tool_name, parameters);
        let response = self
            .client
            .post(format!("{}/api/call-mcp-tool", self.base_url))
            .json(&request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Post the conversation and yield the assistant's stream events until `[DONE]`.
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<BoxStream<'static, Result<UiStreamEvent>>> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({ "messages": messages }))
            .send()
            .await?;
        let response = check(response).await?;

        let events = decode_stream(Box::pin(response.bytes_stream()))
            .take_while(|event| {
                let done = matches!(event, Ok(e) if e.is_done());
                futures_util::future::ready(!done)
            })
            .filter_map(|event| async move {
                match event {
                    Err(e) => Some(Err(anyhow!("Stream interrupted: {}", e))),
                    Ok(event) => match serde_json::from_str::<UiStreamEvent>(&event.data) {
                        Ok(parsed) => Some(Ok(parsed)),
                        Err(e) => {
                            tracing::debug!("skipping unknown stream event: {}", e);
                            None
                        }
                    },
                }
            });

        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_call_tool_posts_envelope() {
        let app = Router::new().route(
            "/api/call-mcp-tool",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["toolName"], "greet");
                assert_eq!(body["parameters"]["name"], "Ada");
                Json(json!({"success": true, "result": {"content": [{"type": "text", "text": "Hello, Ada!"}]}}))
            }),
        );
        let api = ApiClient::new(&serve(app).await);

        let response = api.call_tool("greet", json!({"name": "Ada"})).await.unwrap();
        assert_eq!(response.first_text(), Some("Hello, Ada!"));
    }

    #[tokio::test]
    async fn test_http_error_carries_status() {
        let app = Router::new().route(
            "/api/call-mcp-tool",
            get(|| async { StatusCode::BAD_GATEWAY }),
        );
        let api = ApiClient::new(&serve(app).await);

        let err = api.status().await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP error! status: 502");
    }

    #[tokio::test]
    async fn test_chat_stream_stops_at_done() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                let body = concat!(
                    "data: {\"type\":\"start\"}\n\n",
                    "data: {\"type\":\"text-start\",\"id\":\"t\"}\n\n",
                    "data: {\"type\":\"text-delta\",\"id\":\"t\",\"delta\":\"Hi\"}\n\n",
                    "data: {\"type\":\"reasoning-delta\",\"id\":\"r\",\"delta\":\"?\"}\n\n",
                    "data: {\"type\":\"finish\"}\n\n",
                    "data: [DONE]\n\n",
                );
                ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
            }),
        );
        let api = ApiClient::new(&serve(app).await);

        let events: Vec<UiStreamEvent> = api
            .chat_stream(&[ChatMessage::user("hello")])
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 4);
        assert_eq!(events.last(), Some(&UiStreamEvent::Finish));
    }

    #[tokio::test]
    async fn test_chat_rate_limit_mentions_429() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "rate limit exceeded"})))
            }),
        );
        let api = ApiClient::new(&serve(app).await);

        let err = api.chat_stream(&[ChatMessage::user("hello")]).await.err().unwrap();
        assert!(err.to_string().contains("429"));
    }
}
