//! `/api/chat`: relays the conversation to the model and streams the answer
//! back in the UI message stream format.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures_util::stream;
use serde::Deserialize;
use serde_json::json;
use shapekit_core::ai::LlmError;
use shapekit_core::stream::{DONE_FRAME, UI_STREAM_HEADER, UI_STREAM_VERSION};
use shapekit_core::{ChatMessage, ChatSession, McpClient, UiStreamEvent};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::app::AppState;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// First `x-forwarded-for` hop, else the peer address.
fn client_key(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let client = client_key(&headers, peer);
    if !state.limiter.check(&client) {
        tracing::warn!(%client, "chat rate limit hit");
        return error_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded");
    }

    let mcp = match McpClient::connect(&state.mcp_url).await {
        Ok(mcp) => mcp,
        Err(e) => {
            tracing::error!("MCP connect failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };
    let tools = match mcp.list_tools().await {
        Ok(tools) => tools,
        Err(e) => {
            tracing::error!("MCP tool listing failed: {}", e);
            mcp.close().await;
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };

    tracing::info!(
        messages = request.messages.len(),
        tools = tools.len(),
        model = state.llm.model(),
        "starting chat session"
    );

    let (tx, rx) = mpsc::channel::<UiStreamEvent>(EVENT_BUFFER);
    let task_state = state.clone();
    tokio::spawn(async move {
        let session = ChatSession::new(&task_state.llm, &mcp, tools, task_state.max_steps)
            .with_max_duration(task_state.max_duration);
        match session.run(&request.messages, &tx).await {
            Ok(()) => {}
            Err(LlmError::Disconnected) => tracing::debug!("chat client went away"),
            Err(e) => {
                tracing::warn!("chat session failed: {}", e);
                let _ = tx.send(UiStreamEvent::error(e.to_string())).await;
            }
        }
        mcp.close().await;
    });

    let frames = stream::unfold(Some(rx), |rx| async move {
        let mut rx = rx?;
        match rx.recv().await {
            Some(event) => Some((Ok::<_, Infallible>(event.to_sse()), Some(rx))),
            None => Some((Ok(DONE_FRAME.to_string()), None)),
        }
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static(UI_STREAM_HEADER), UI_STREAM_VERSION),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{router, test_support};
    use axum::{routing::post, Router};
    use futures_util::StreamExt;
    use serde_json::Value;
    use shapekit_core::sse::decode_stream;
    use shapekit_core::stream::apply_event;
    use shapekit_core::{StreamProgress, ToolState};

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, peer), "10.0.0.1");

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers, peer), "203.0.113.7");
    }

    async fn fake_llm(Json(body): Json<Value>) -> Response {
        let messages = body["messages"].as_array().cloned().unwrap_or_default();
        assert_eq!(messages[0]["role"], "system");
        let answered = messages.iter().any(|m| m["role"] == "tool");

        let frames: Vec<Value> = if answered {
            vec![
                json!({"choices": [{"index": 0, "delta": {"content": "Done."}}]}),
                json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
            ]
        } else {
            vec![
                json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "id": "call_1", "type": "function", "function": {"name": "greet", "arguments": "{\"name\":\"Ada\"}"}}]}}]}),
                json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
            ]
        };

        let mut body: String = frames.iter().map(|f| format!("data: {}\n\n", f)).collect();
        body.push_str("data: [DONE]\n\n");
        ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
    }

    async fn rate_limited_llm() -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": {"message": "Rate limit reached", "type": "requests"}})),
        )
            .into_response()
    }

    async fn fake_mcp(Json(body): Json<Value>) -> Response {
        let id = body["id"].clone();
        match body["method"].as_str().unwrap_or_default() {
            "initialize" => Json(json!({"jsonrpc": "2.0", "id": id, "result": {
                "protocolVersion": "2025-03-26", "capabilities": {}, "serverInfo": {"name": "fake"}
            }}))
            .into_response(),
            "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
            "tools/list" => Json(json!({"jsonrpc": "2.0", "id": id, "result": {"tools": [
                {"name": "greet", "inputSchema": {"type": "object", "properties": {"name": {"type": "string"}}}}
            ]}}))
            .into_response(),
            _ => Json(json!({"jsonrpc": "2.0", "id": id, "result": {
                "content": [{"type": "text", "text": "Hello, Ada!"}]
            }}))
            .into_response(),
        }
    }

    async fn post_chat(base: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/api/chat", base))
            .json(&json!({"messages": [
                {"id": "m1", "role": "user", "parts": [{"type": "text", "text": "Say hi to Ada"}]}
            ]}))
            .send()
            .await
            .unwrap()
    }

    /// Replay the response body onto a fresh assistant message.
    async fn collect(response: reqwest::Response) -> (ChatMessage, StreamProgress, bool) {
        let mut events = Box::pin(decode_stream(Box::pin(response.bytes_stream())));
        let mut message = ChatMessage::assistant("local");
        let mut progress = StreamProgress::Continue;
        let mut saw_done = false;

        while let Some(event) = events.next().await {
            let event = event.unwrap();
            if event.is_done() {
                saw_done = true;
                break;
            }
            let parsed: UiStreamEvent = serde_json::from_str(&event.data).unwrap();
            progress = apply_event(&mut message, parsed);
        }
        (message, progress, saw_done)
    }

    #[tokio::test]
    async fn test_chat_streams_tool_round_trip() {
        let llm = test_support::serve(Router::new().route("/v1/chat/completions", post(fake_llm))).await;
        let mcp = test_support::serve(Router::new().route("/mcp", post(fake_mcp))).await;
        let state = test_support::state(&format!("{}/mcp", mcp), &format!("{}/v1", llm));
        let base = test_support::serve(router(Arc::new(state))).await;

        let response = post_chat(&base).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[UI_STREAM_HEADER], UI_STREAM_VERSION);

        let (message, progress, saw_done) = collect(response).await;
        assert!(saw_done);
        assert_eq!(progress, StreamProgress::Finished);
        assert_eq!(message.text_content(), "Done.");
        let tool = message.tool_parts().next().unwrap();
        assert_eq!(tool.tool_name, "greet");
        assert_eq!(tool.state, ToolState::OutputAvailable);
        assert_eq!(tool.output, Some(json!("Hello, Ada!")));
    }

    #[tokio::test]
    async fn test_llm_rate_limit_becomes_error_event() {
        let llm = test_support::serve(Router::new().route("/v1/chat/completions", post(rate_limited_llm))).await;
        let mcp = test_support::serve(Router::new().route("/mcp", post(fake_mcp))).await;
        let state = test_support::state(&format!("{}/mcp", mcp), &format!("{}/v1", llm));
        let base = test_support::serve(router(Arc::new(state))).await;

        let (_, progress, saw_done) = collect(post_chat(&base).await).await;
        assert!(saw_done);
        match progress {
            StreamProgress::Failed(message) => assert!(message.contains("429")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    async fn stalling_llm() -> Response {
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        StatusCode::OK.into_response()
    }

    #[tokio::test]
    async fn test_slow_model_ends_with_error_then_done() {
        let llm = test_support::serve(Router::new().route("/v1/chat/completions", post(stalling_llm))).await;
        let mcp = test_support::serve(Router::new().route("/mcp", post(fake_mcp))).await;
        let mut state = test_support::state(&format!("{}/mcp", mcp), &format!("{}/v1", llm));
        state.max_duration = std::time::Duration::from_millis(50);
        let base = test_support::serve(router(Arc::new(state))).await;

        let response = post_chat(&base).await;
        assert_eq!(response.status(), 200);
        let (_, progress, saw_done) = collect(response).await;
        assert!(saw_done);
        match progress {
            StreamProgress::Failed(message) => assert_eq!(message, LlmError::Timeout.to_string()),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_setup_failure_is_500() {
        let state = test_support::state("http://127.0.0.1:9/mcp", "http://127.0.0.1:9/v1");
        let base = test_support::serve(router(Arc::new(state))).await;

        let response = post_chat(&base).await;
        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_chat_rate_limit() {
        let state = test_support::state("http://127.0.0.1:9/mcp", "http://127.0.0.1:9/v1");
        let base = test_support::serve(router(Arc::new(state))).await;

        let mut last = 0;
        for _ in 0..=crate::app::CHAT_RATE_LIMIT {
            last = post_chat(&base).await.status().as_u16();
        }
        assert_eq!(last, 429);
    }
}
