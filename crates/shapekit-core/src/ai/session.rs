//! One chat turn: stream completions, run the tools the model asks for, repeat.

use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

use super::error::{LlmError, Result};
use super::openai::{CompletionChunk, OpenAIClient, OpenAIMessage, OpenAITool, OpenAIToolCall};
use crate::chat::{new_message_id, ChatMessage, ChatRole, MessagePart, ToolPart, ToolState};
use crate::mcp::{CallToolResult, McpClient, McpTool};
use crate::stream::UiStreamEvent;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for Shape Network blockchain data and Web3 operations.

Always respond in plain text only. Do not use markdown formatting.";

pub const MAX_DURATION: Duration = Duration::from_secs(30);

/// Convert the UI conversation into chat-completion messages.
///
/// An assistant message holds one or more steps; each step is some text
/// followed by the tool calls made in it. Tool calls that never produced an
/// output are dropped since the API rejects unanswered calls.
pub fn to_openai_messages(system: &str, messages: &[ChatMessage]) -> Vec<OpenAIMessage> {
    let mut out = vec![OpenAIMessage::system(system)];

    for message in messages {
        match message.role {
            ChatRole::System => out.push(OpenAIMessage::system(&message.text_content())),
            ChatRole::User => out.push(OpenAIMessage::user(&message.text_content())),
            ChatRole::Assistant => push_assistant(&mut out, message),
        }
    }
    out
}

fn push_assistant(out: &mut Vec<OpenAIMessage>, message: &ChatMessage) {
    let mut text = String::new();
    let mut tools: Vec<&ToolPart> = Vec::new();

    for part in &message.parts {
        match part {
            MessagePart::Text { text: t } => {
                if !tools.is_empty() {
                    flush_step(out, std::mem::take(&mut text), std::mem::take(&mut tools));
                }
                text.push_str(t);
            }
            MessagePart::Tool(tool)
                if matches!(tool.state, ToolState::OutputAvailable | ToolState::OutputError) =>
            {
                tools.push(tool)
            }
            _ => {}
        }
    }
    flush_step(out, text, tools);
}

fn flush_step(out: &mut Vec<OpenAIMessage>, text: String, tools: Vec<&ToolPart>) {
    if tools.is_empty() {
        if !text.is_empty() {
            out.push(OpenAIMessage::assistant(&text));
        }
        return;
    }

    let calls = tools
        .iter()
        .map(|tool| {
            let arguments = tool.input.as_ref().map(Value::to_string).unwrap_or_else(|| "{}".to_string());
            OpenAIToolCall::function(&tool.tool_call_id, &tool.tool_name, &arguments)
        })
        .collect();
    let content = if text.is_empty() { None } else { Some(text) };
    out.push(OpenAIMessage::assistant_tool_calls(content, calls));

    for tool in tools {
        let result = match (&tool.output, &tool.error_text) {
            (Some(Value::String(s)), _) => s.clone(),
            (Some(other), _) => other.to_string(),
            (None, Some(error)) => error.clone(),
            (None, None) => String::new(),
        };
        out.push(OpenAIMessage::tool(&tool.tool_call_id, &result));
    }
}

/// What a tool result looks like in the UI stream: the text itself when the
/// result is a single text block, the full result object otherwise.
pub fn tool_output_value(result: &CallToolResult) -> Value {
    match result.content.as_slice() {
        [only] if only.kind == "text" => Value::String(only.text.clone().unwrap_or_default()),
        _ => serde_json::to_value(result).unwrap_or(Value::Null),
    }
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
    announced: bool,
}

pub struct ChatSession<'a> {
    llm: &'a OpenAIClient,
    mcp: &'a McpClient,
    tools: Vec<McpTool>,
    max_steps: usize,
    max_duration: Duration,
}

impl<'a> ChatSession<'a> {
    pub fn new(llm: &'a OpenAIClient, mcp: &'a McpClient, tools: Vec<McpTool>, max_steps: usize) -> Self {
        Self {
            llm,
            mcp,
            tools,
            max_steps: max_steps.max(1),
            max_duration: MAX_DURATION,
        }
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Stream the assistant's answer to `messages` into `events`.
    ///
    /// Returns `Err` for failures the caller should report as an `error`
    /// event. Tool failures are not errors: they become `tool-output-error`
    /// parts and the model gets to react to them.
    pub async fn run(&self, messages: &[ChatMessage], events: &mpsc::Sender<UiStreamEvent>) -> Result<()> {
        match tokio::time::timeout(self.max_duration, self.run_steps(messages, events)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("chat session exceeded {:?}", self.max_duration);
                Err(LlmError::Timeout)
            }
        }
    }

    async fn run_steps(&self, messages: &[ChatMessage], events: &mpsc::Sender<UiStreamEvent>) -> Result<()> {
        let mut conversation = to_openai_messages(SYSTEM_PROMPT, messages);
        let tools: Vec<OpenAITool> = self.tools.iter().map(OpenAITool::from).collect();

        emit(events, UiStreamEvent::Start { message_id: Some(new_message_id()) }).await?;

        for step in 0..self.max_steps {
            emit(events, UiStreamEvent::StartStep).await?;

            let (text, calls) = self.stream_step(step, &conversation, &tools, events).await?;

            if calls.is_empty() {
                emit(events, UiStreamEvent::FinishStep).await?;
                break;
            }

            let tool_calls = calls
                .iter()
                .map(|c| OpenAIToolCall::function(&c.id, &c.name, &c.arguments))
                .collect();
            let content = if text.is_empty() { None } else { Some(text) };
            conversation.push(OpenAIMessage::assistant_tool_calls(content, tool_calls));

            for call in &calls {
                let reply = self.execute(call, events).await?;
                conversation.push(OpenAIMessage::tool(&call.id, &reply));
            }

            emit(events, UiStreamEvent::FinishStep).await?;

            if step + 1 == self.max_steps {
                tracing::debug!(max_steps = self.max_steps, "stopping after the last allowed step");
            }
        }

        emit(events, UiStreamEvent::Finish).await
    }

    /// One completion call. Text is forwarded as it arrives; tool calls are
    /// announced as soon as their name is known and returned once complete.
    async fn stream_step(
        &self,
        step: usize,
        conversation: &[OpenAIMessage],
        tools: &[OpenAITool],
        events: &mpsc::Sender<UiStreamEvent>,
    ) -> Result<(String, Vec<PendingCall>)> {
        let mut stream = self.llm.stream_chat(conversation, tools).await?;

        let text_id = format!("text-{}", step);
        let mut text = String::new();
        let mut text_open = false;
        let mut calls: BTreeMap<usize, PendingCall> = BTreeMap::new();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                CompletionChunk::Text(delta) => {
                    if !text_open {
                        emit(events, UiStreamEvent::TextStart { id: text_id.clone() }).await?;
                        text_open = true;
                    }
                    text.push_str(&delta);
                    emit(events, UiStreamEvent::TextDelta { id: text_id.clone(), delta }).await?;
                }
                CompletionChunk::ToolCall { index, id, name, arguments } => {
                    let call = calls.entry(index).or_default();
                    if let Some(id) = id {
                        call.id = id;
                    }
                    if let Some(name) = name {
                        call.name.push_str(&name);
                    }
                    if let Some(arguments) = arguments {
                        call.arguments.push_str(&arguments);
                    }
                    if !call.announced && !call.id.is_empty() && !call.name.is_empty() {
                        call.announced = true;
                        emit(
                            events,
                            UiStreamEvent::ToolInputStart {
                                tool_call_id: call.id.clone(),
                                tool_name: call.name.clone(),
                            },
                        )
                        .await?;
                    }
                }
                CompletionChunk::Finish(reason) => {
                    tracing::debug!(step, reason = %reason, "completion finished");
                }
            }
        }

        if text_open {
            emit(events, UiStreamEvent::TextEnd { id: text_id }).await?;
        }

        Ok((text, calls.into_values().filter(|c| !c.name.is_empty()).collect()))
    }

    /// Run one tool call and return what the model should see as its result.
    async fn execute(&self, call: &PendingCall, events: &mpsc::Sender<UiStreamEvent>) -> Result<String> {
        let raw = if call.arguments.trim().is_empty() { "{}" } else { call.arguments.as_str() };

        let input: Value = match serde_json::from_str(raw) {
            Ok(input) => input,
            Err(e) => {
                let error_text = format!("Invalid tool arguments: {}", e);
                emit(
                    events,
                    UiStreamEvent::ToolInputAvailable {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        input: json!({}),
                    },
                )
                .await?;
                emit(
                    events,
                    UiStreamEvent::ToolOutputError {
                        tool_call_id: call.id.clone(),
                        error_text: error_text.clone(),
                    },
                )
                .await?;
                return Ok(error_text);
            }
        };

        emit(
            events,
            UiStreamEvent::ToolInputAvailable {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                input: input.clone(),
            },
        )
        .await?;

        tracing::info!(tool = %call.name, "calling MCP tool");
        match self.mcp.call_tool(&call.name, input).await {
            Ok(result) if result.is_error => {
                let error_text = result.text();
                emit(
                    events,
                    UiStreamEvent::ToolOutputError {
                        tool_call_id: call.id.clone(),
                        error_text: error_text.clone(),
                    },
                )
                .await?;
                Ok(error_text)
            }
            Ok(result) => {
                emit(
                    events,
                    UiStreamEvent::ToolOutputAvailable {
                        tool_call_id: call.id.clone(),
                        output: tool_output_value(&result),
                    },
                )
                .await?;
                Ok(result.text())
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, "tool call failed: {}", e);
                let error_text = e.to_string();
                emit(
                    events,
                    UiStreamEvent::ToolOutputError {
                        tool_call_id: call.id.clone(),
                        error_text: error_text.clone(),
                    },
                )
                .await?;
                Ok(format!("Error: {}", error_text))
            }
        }
    }
}

async fn emit(events: &mpsc::Sender<UiStreamEvent>, event: UiStreamEvent) -> Result<()> {
    events.send(event).await.map_err(|_| LlmError::Disconnected)
}
