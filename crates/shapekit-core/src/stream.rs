//! UI message stream: the event protocol between `/api/chat` and the chat panel.
//!
//! Every event is a JSON object sent as one SSE `data:` line. The server
//! produces them with [`UiStreamEvent::to_sse`]; the client folds them into an
//! assistant [`ChatMessage`] with [`apply_event`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{ChatMessage, MessagePart, ToolPart, ToolState};

pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_STREAM_VERSION: &str = "v1";
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UiStreamEvent {
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    StartStep,
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
    },
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },
    Error {
        error_text: String,
    },
    FinishStep,
    Finish,
}

impl UiStreamEvent {
    pub fn error(message: impl Into<String>) -> Self {
        UiStreamEvent::Error {
            error_text: message.into(),
        }
    }

    pub fn to_sse(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("data: {}\n\n", json),
            Err(e) => format!(
                "data: {}\n\n",
                serde_json::json!({"type": "error", "errorText": e.to_string()})
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamProgress {
    Continue,
    Finished,
    Failed(String),
}

fn tool_part<'a>(
    message: &'a mut ChatMessage,
    tool_call_id: &str,
    tool_name: &str,
) -> Option<&'a mut ToolPart> {
    if message.tool_part_mut(tool_call_id).is_none() {
        message.parts.push(MessagePart::Tool(ToolPart {
            tool_name: tool_name.to_string(),
            tool_call_id: tool_call_id.to_string(),
            state: ToolState::InputStreaming,
            input: None,
            output: None,
            error_text: None,
        }));
    }
    message.tool_part_mut(tool_call_id)
}

/// Fold one event into the assistant message being streamed.
pub fn apply_event(message: &mut ChatMessage, event: UiStreamEvent) -> StreamProgress {
    match event {
        UiStreamEvent::Start { message_id } => {
            if let Some(id) = message_id.filter(|id| !id.is_empty()) {
                message.id = id;
            }
        }
        UiStreamEvent::StartStep => message.parts.push(MessagePart::Other {
            kind: "step-start".to_string(),
            fields: Default::default(),
        }),
        UiStreamEvent::TextStart { .. } => message.parts.push(MessagePart::Text {
            text: String::new(),
        }),
        UiStreamEvent::TextDelta { delta, .. } => message.push_text(&delta),
        UiStreamEvent::TextEnd { .. } | UiStreamEvent::FinishStep => {}
        UiStreamEvent::ToolInputStart {
            tool_call_id,
            tool_name,
        } => {
            tool_part(message, &tool_call_id, &tool_name);
        }
        UiStreamEvent::ToolInputAvailable {
            tool_call_id,
            tool_name,
            input,
        } => {
            if let Some(part) = tool_part(message, &tool_call_id, &tool_name) {
                part.input = Some(input);
                part.state = ToolState::InputAvailable;
            }
        }
        UiStreamEvent::ToolOutputAvailable { tool_call_id, output } => {
            match message.tool_part_mut(&tool_call_id) {
                Some(part) => {
                    part.output = Some(output);
                    part.state = ToolState::OutputAvailable;
                }
                None => tracing::debug!(tool_call_id = %tool_call_id, "output for unknown tool call"),
            }
        }
        UiStreamEvent::ToolOutputError {
            tool_call_id,
            error_text,
        } => match message.tool_part_mut(&tool_call_id) {
            Some(part) => {
                part.error_text = Some(error_text);
                part.state = ToolState::OutputError;
            }
            None => tracing::debug!(tool_call_id = %tool_call_id, "error for unknown tool call"),
        },
        UiStreamEvent::Error { error_text } => return StreamProgress::Failed(error_text),
        UiStreamEvent::Finish => return StreamProgress::Finished,
    }
    StreamProgress::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_names() {
        let event = UiStreamEvent::ToolInputAvailable {
            tool_call_id: "call_1".to_string(),
            tool_name: "getShapeNft".to_string(),
            input: json!({"address": "0xabc"}),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "tool-input-available", "toolCallId": "call_1",
                   "toolName": "getShapeNft", "input": {"address": "0xabc"}})
        );
        assert_eq!(
            UiStreamEvent::FinishStep.to_sse(),
            "data: {\"type\":\"finish-step\"}\n\n"
        );
    }

    #[test]
    fn test_decode_text_delta() {
        let event: UiStreamEvent =
            serde_json::from_str(r#"{"type":"text-delta","id":"t0","delta":"Hi"}"#).unwrap();
        assert_eq!(
            event,
            UiStreamEvent::TextDelta {
                id: "t0".to_string(),
                delta: "Hi".to_string()
            }
        );
    }

    #[test]
    fn test_fold_full_exchange() {
        let events = vec![
            UiStreamEvent::Start { message_id: Some("srv_1".to_string()) },
            UiStreamEvent::StartStep,
            UiStreamEvent::ToolInputStart {
                tool_call_id: "c1".to_string(),
                tool_name: "greet".to_string(),
            },
            UiStreamEvent::ToolInputAvailable {
                tool_call_id: "c1".to_string(),
                tool_name: "greet".to_string(),
                input: json!({"name": "Ada"}),
            },
            UiStreamEvent::ToolOutputAvailable {
                tool_call_id: "c1".to_string(),
                output: json!("Hello, Ada!"),
            },
            UiStreamEvent::FinishStep,
            UiStreamEvent::StartStep,
            UiStreamEvent::TextStart { id: "t1".to_string() },
            UiStreamEvent::TextDelta { id: "t1".to_string(), delta: "Said ".to_string() },
            UiStreamEvent::TextDelta { id: "t1".to_string(), delta: "hi.".to_string() },
            UiStreamEvent::TextEnd { id: "t1".to_string() },
            UiStreamEvent::FinishStep,
        ];

        let mut message = ChatMessage::assistant("local");
        for event in events {
            assert_eq!(apply_event(&mut message, event), StreamProgress::Continue);
        }
        assert_eq!(apply_event(&mut message, UiStreamEvent::Finish), StreamProgress::Finished);

        assert_eq!(message.id, "srv_1");
        assert_eq!(message.text_content(), "Said hi.");
        let tool = message.tool_parts().next().unwrap();
        assert_eq!(tool.state, ToolState::OutputAvailable);
        assert_eq!(tool.output, Some(json!("Hello, Ada!")));
    }

    #[test]
    fn test_error_event_fails_stream() {
        let mut message = ChatMessage::assistant("local");
        let progress = apply_event(&mut message, UiStreamEvent::error("429 Too Many Requests"));
        assert_eq!(progress, StreamProgress::Failed("429 Too Many Requests".to_string()));
    }

    #[test]
    fn test_tool_error_marks_part() {
        let mut message = ChatMessage::assistant("local");
        apply_event(
            &mut message,
            UiStreamEvent::ToolInputStart {
                tool_call_id: "c2".to_string(),
                tool_name: "getShapeNft".to_string(),
            },
        );
        apply_event(
            &mut message,
            UiStreamEvent::ToolOutputError {
                tool_call_id: "c2".to_string(),
                error_text: "boom".to_string(),
            },
        );
        let tool = message.tool_parts().next().unwrap();
        assert_eq!(tool.state, ToolState::OutputError);
        assert_eq!(tool.error_text.as_deref(), Some("boom"));
    }
}
