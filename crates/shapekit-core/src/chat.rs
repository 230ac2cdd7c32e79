//! UI-agnostic chat types
//!
//! The message shape matches what the chat endpoint accepts and what the
//! stream decoder produces: a message is an ordered list of parts, where a part
//! is either text or a tool invocation identified by a `tool-<name>` type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// Lifecycle of a tool invocation inside an assistant message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl ToolState {
    pub fn label(&self) -> &'static str {
        match self {
            ToolState::InputStreaming => "Pending",
            ToolState::InputAvailable => "Running",
            ToolState::OutputAvailable => "Completed",
            ToolState::OutputError => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolPart {
    pub tool_name: String,
    pub tool_call_id: String,
    pub state: ToolState,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePart {
    Text { text: String },
    Tool(ToolPart),
    /// Part types the UI does not render (`step-start`, `reasoning`, ...).
    Other { kind: String, fields: Map<String, Value> },
}

/// Wire form of a part; `type` is open-ended so it cannot be a serde tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<ToolState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_text: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<RawPart> for MessagePart {
    fn from(raw: RawPart) -> Self {
        if raw.kind == "text" {
            return MessagePart::Text {
                text: raw.text.unwrap_or_default(),
            };
        }

        if let Some(tool_name) = raw.kind.strip_prefix("tool-") {
            return MessagePart::Tool(ToolPart {
                tool_name: tool_name.to_string(),
                tool_call_id: raw.tool_call_id.unwrap_or_default(),
                state: raw.state.unwrap_or(ToolState::InputStreaming),
                input: raw.input,
                output: raw.output,
                error_text: raw.error_text,
            });
        }

        let mut fields = raw.rest;
        if let Some(text) = raw.text {
            fields.insert("text".to_string(), Value::String(text));
        }
        MessagePart::Other {
            kind: raw.kind,
            fields,
        }
    }
}

impl From<MessagePart> for RawPart {
    fn from(part: MessagePart) -> Self {
        let empty = RawPart {
            kind: String::new(),
            text: None,
            tool_call_id: None,
            state: None,
            input: None,
            output: None,
            error_text: None,
            rest: Map::new(),
        };

        match part {
            MessagePart::Text { text } => RawPart {
                kind: "text".to_string(),
                text: Some(text),
                ..empty
            },
            MessagePart::Tool(tool) => RawPart {
                kind: format!("tool-{}", tool.tool_name),
                tool_call_id: Some(tool.tool_call_id),
                state: Some(tool.state),
                input: tool.input,
                output: tool.output,
                error_text: tool.error_text,
                ..empty
            },
            MessagePart::Other { kind, fields } => RawPart {
                kind,
                rest: fields,
                ..empty
            },
        }
    }
}

impl Serialize for MessagePart {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawPart::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MessagePart {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawPart::deserialize(deserializer).map(MessagePart::from)
    }
}

/// A chat message in the AI conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub role: ChatRole,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn user(text: &str) -> Self {
        Self {
            id: new_message_id(),
            role: ChatRole::User,
            parts: vec![MessagePart::Text {
                text: text.to_string(),
            }],
        }
    }

    pub fn assistant(id: &str) -> Self {
        Self {
            id: id.to_string(),
            role: ChatRole::Assistant,
            parts: Vec::new(),
        }
    }

    /// All text parts joined, tool parts skipped.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_parts(&self) -> impl Iterator<Item = &ToolPart> {
        self.parts.iter().filter_map(|part| match part {
            MessagePart::Tool(tool) => Some(tool),
            _ => None,
        })
    }

    pub fn tool_part_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolPart> {
        self.parts.iter_mut().find_map(|part| match part {
            MessagePart::Tool(tool) if tool.tool_call_id == tool_call_id => Some(tool),
            _ => None,
        })
    }

    /// Append streamed text, extending the trailing text part when there is one.
    pub fn push_text(&mut self, delta: &str) {
        if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
            return;
        }
        self.parts.push(MessagePart::Text {
            text: delta.to_string(),
        });
    }
}

pub fn new_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

/// Request state of the chat panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatStatus {
    #[default]
    Ready,
    Submitted,
    Streaming,
    Error,
}

impl ChatStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, ChatStatus::Submitted | ChatStatus::Streaming)
    }

    pub fn accepts_input(&self) -> bool {
        !self.is_busy()
    }
}

pub const RATE_LIMIT_TITLE: &str = "Rate Limit Exceeded";
pub const RATE_LIMIT_BODY: &str =
    "To prevent abuse of API keys, we've set a rate limit. Please wait a moment before trying again.";
pub const GENERIC_ERROR_TITLE: &str = "Something went wrong";

/// What the chat panel shows when a request fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatErrorNotice {
    pub title: String,
    pub body: String,
    pub rate_limited: bool,
}

impl ChatErrorNotice {
    pub fn from_message(message: &str) -> Self {
        let rate_limited = message.contains("429") || message.to_lowercase().contains("rate limit");
        if rate_limited {
            Self {
                title: RATE_LIMIT_TITLE.to_string(),
                body: RATE_LIMIT_BODY.to_string(),
                rate_limited,
            }
        } else {
            Self {
                title: GENERIC_ERROR_TITLE.to_string(),
                body: message.to_string(),
                rate_limited,
            }
        }
    }
}
