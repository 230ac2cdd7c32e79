use futures_util::future;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{LlmError, Result};
use crate::mcp::McpTool;
use crate::sse::decode_stream;

#[derive(Debug, Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [OpenAIMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [OpenAITool],
    stream: bool,
}

fn no_tools(tools: &&[OpenAITool]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl OpenAIMessage {
    fn new(role: &str, content: Option<String>) -> Self {
        Self {
            role: role.to_string(),
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: &str) -> Self {
        Self::new("system", Some(content.to_string()))
    }

    pub fn user(content: &str) -> Self {
        Self::new("user", Some(content.to_string()))
    }

    pub fn assistant(content: &str) -> Self {
        Self::new("assistant", Some(content.to_string()))
    }

    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<OpenAIToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::new("assistant", content)
        }
    }

    pub fn tool(tool_call_id: &str, content: &str) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.to_string()),
            ..Self::new("tool", Some(content.to_string()))
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&McpTool> for OpenAITool {
    fn from(tool: &McpTool) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: OpenAIFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OpenAIToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: OpenAIFunctionCall,
}

impl OpenAIToolCall {
    pub fn function(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            tool_type: "function".to_string(),
            function: OpenAIFunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OpenAIFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// One decoded piece of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionChunk {
    Text(String),
    /// Tool calls arrive in fragments keyed by `index`; `id` and `name` come
    /// with the first fragment, `arguments` is spread over the rest.
    ToolCall {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    Finish(String),
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Start a streaming chat completion with `tools` attached.
    pub async fn stream_chat(
        &self,
        messages: &[OpenAIMessage],
        tools: &[OpenAITool],
    ) -> Result<BoxStream<'static, Result<CompletionChunk>>> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let request = OpenAIChatRequest {
            model: &self.model,
            messages,
            tools,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_error(status, &body));
        }

        let chunks = decode_stream(Box::pin(response.bytes_stream()))
            .take_while(|event| future::ready(!matches!(event, Ok(e) if e.is_done())))
            .map(|event| match event {
                Ok(event) => parse_chunk(&event.data),
                Err(e) => vec![Err(LlmError::from(e))],
            })
            .flat_map(stream::iter);

        Ok(chunks.boxed())
    }

    fn classify_error(&self, status: u16, body: &str) -> LlmError {
        let Ok(error) = serde_json::from_str::<OpenAIError>(body) else {
            if status == 429 {
                return LlmError::RateLimited(body.to_string());
            }
            return LlmError::Api {
                status,
                message: body.to_string(),
            };
        };

        let error_type = error.error.error_type.as_deref().unwrap_or("");
        let code = error.error.code.as_deref().unwrap_or("");

        if status == 401 || error_type == "invalid_api_key" {
            return LlmError::AuthFailed(error.error.message);
        }
        if status == 429 || error_type == "rate_limit_exceeded" {
            return LlmError::RateLimited(error.error.message);
        }
        if code == "model_not_found" {
            return LlmError::ModelNotFound(self.model.clone());
        }
        LlmError::Api {
            status,
            message: error.error.message,
        }
    }
}

fn parse_chunk(data: &str) -> Vec<Result<CompletionChunk>> {
    let chunk: ChatChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            if let Ok(error) = serde_json::from_str::<OpenAIError>(data) {
                return vec![Err(LlmError::Api {
                    status: 0,
                    message: error.error.message,
                })];
            }
            tracing::debug!("skipping unrecognized completion chunk: {}", e);
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            out.push(Ok(CompletionChunk::Text(text)));
        }
        for call in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match call.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            out.push(Ok(CompletionChunk::ToolCall {
                index: call.index,
                id: call.id,
                name,
                arguments,
            }));
        }
        if let Some(reason) = choice.finish_reason {
            out.push(Ok(CompletionChunk::Finish(reason)));
        }
    }
    out
}
