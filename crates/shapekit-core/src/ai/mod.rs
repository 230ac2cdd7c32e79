pub mod error;
pub mod openai;
pub mod session;

pub use error::LlmError;
pub use openai::{CompletionChunk, OpenAIClient, OpenAIMessage, OpenAITool};
pub use session::{to_openai_messages, ChatSession, MAX_DURATION, SYSTEM_PROMPT};
