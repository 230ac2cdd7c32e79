pub mod ai;
pub mod chain;
pub mod chat;
pub mod config;
pub mod mcp;
pub mod mint;
pub mod normalize;
pub mod payloads;
pub mod sse;
pub mod stream;
pub mod tool;
pub mod wallet;

// Re-export main types for convenience
pub use ai::{ChatSession, LlmError, OpenAIClient};
pub use chain::{AlchemyNftClient, Network, RpcClient, RpcError};
pub use chat::{ChatErrorNotice, ChatMessage, ChatRole, ChatStatus, MessagePart, ToolPart, ToolState};
pub use config::{ClientSettings, Config, ConfigError, Environment};
pub use mcp::{McpClient, McpError, McpTool, ToolContent};
pub use mint::{MintStatus, PendingSlot, PendingTransaction};
pub use normalize::{normalize, normalize_text, ToolOutcome};
pub use stream::{apply_event, StreamProgress, UiStreamEvent};
pub use tool::{CallToolRequest, McpStatusResponse, ToolResponse, ToolResult};
pub use wallet::{WalletClient, WalletError};
