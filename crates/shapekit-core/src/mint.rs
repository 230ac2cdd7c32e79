//! Detection of prepared `mintNFT` transactions in assistant messages.
//!
//! The `prepareMintSVGNFT` tool returns a ready-to-sign contract call. It can
//! reach the chat either as a tool part or echoed by the model into its text,
//! raw, fenced or buried in prose, so every form is tried.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::{short_address, Network};
use crate::chat::{ChatMessage, ChatRole, ToolState};

pub const MINT_FUNCTION: &str = "mintNFT";
pub const PREPARE_MINT_TOOL: &str = "prepareMintSVGNFT";

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("fenced json pattern"));

static LOOSE_MINT_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{[\s\S]*"success"\s*:\s*true[\s\S]*"transaction"[\s\S]*"mintNFT"[\s\S]*\}"#)
        .expect("loose mint pattern")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MintCall {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintMetadata {
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub recipient_address: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(rename = "tokenURI", default)]
    pub token_uri: String,
    #[serde(default)]
    pub estimated_gas: Option<Value>,
    #[serde(default)]
    pub chain_id: Option<Value>,
    #[serde(default)]
    pub nft_metadata: Option<NftMetadata>,
}

/// Output of `prepareMintSVGNFT`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub transaction: MintCall,
    #[serde(default)]
    pub metadata: MintMetadata,
}

impl PendingTransaction {
    /// Chain id from the metadata; tools send it as a number or a string.
    pub fn chain_id(&self) -> Option<u64> {
        match self.metadata.chain_id.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn chain_label(&self) -> String {
        match self.chain_id() {
            Some(id) => match Network::from_chain_id(id) {
                Some(network) => format!("{} (Chain ID: {})", network.display_name(), id),
                None => format!("Chain ID: {}", id),
            },
            None => "Unknown chain".to_string(),
        }
    }

    pub fn estimated_gas(&self) -> String {
        match &self.metadata.estimated_gas {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "-".to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn short_recipient(&self) -> String {
        short_address(&self.metadata.recipient_address)
    }

    pub fn short_contract(&self) -> String {
        short_address(&self.metadata.contract_address)
    }
}

/// `success` truthy, `transaction` present, `metadata.functionName == "mintNFT"`.
fn is_mint_payload(value: &Value) -> bool {
    let success = value.get("success").and_then(Value::as_bool).unwrap_or(false);
    let has_transaction = value
        .get("transaction")
        .map(|t| !t.is_null())
        .unwrap_or(false);
    let function = value
        .get("metadata")
        .and_then(|m| m.get("functionName"))
        .and_then(Value::as_str);

    success && has_transaction && function == Some(MINT_FUNCTION)
}

fn from_value(value: Value) -> Option<PendingTransaction> {
    if !is_mint_payload(&value) {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(pending) => Some(pending),
        Err(e) => {
            tracing::debug!("mint payload has unexpected field types: {}", e);
            None
        }
    }
}

fn from_json_text(candidate: &str) -> Option<PendingTransaction> {
    serde_json::from_str::<Value>(candidate).ok().and_then(from_value)
}

/// Look for a prepared mint in free text: whole text, fenced block, then prose.
pub fn detect_in_text(text: &str) -> Option<PendingTransaction> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(pending) = from_json_text(text) {
        return Some(pending);
    }

    for captures in FENCED_JSON.captures_iter(text) {
        if let Some(pending) = captures.get(1).and_then(|m| from_json_text(m.as_str())) {
            return Some(pending);
        }
    }

    LOOSE_MINT_JSON
        .find(text)
        .and_then(|m| from_json_text(m.as_str()))
}

/// A tool output may be the JSON text itself, the decoded object, or an MCP
/// result whose first content block carries the text.
fn detect_in_tool_output(output: &Value) -> Option<PendingTransaction> {
    match output {
        Value::String(text) => from_json_text(text),
        Value::Object(_) => {
            let text = output
                .get("content")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("text"))
                .and_then(Value::as_str);
            match text {
                Some(text) => from_json_text(text),
                None => from_value(output.clone()),
            }
        }
        _ => None,
    }
}

pub fn detect_in_message(message: &ChatMessage) -> Option<PendingTransaction> {
    if message.role != ChatRole::Assistant {
        return None;
    }

    if let Some(pending) = detect_in_text(&message.text_content()) {
        return Some(pending);
    }

    message
        .tool_parts()
        .filter(|tool| tool.tool_name == PREPARE_MINT_TOOL)
        .filter(|tool| tool.state == ToolState::OutputAvailable)
        .find_map(|tool| tool.output.as_ref().and_then(detect_in_tool_output))
}

/// Holds at most one transaction awaiting the user's signature.
#[derive(Debug, Clone, Default)]
pub struct PendingSlot {
    current: Option<PendingTransaction>,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&PendingTransaction> {
        self.current.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.current.is_some()
    }

    /// Fill the slot from the first message carrying a mint. No-op while occupied.
    /// Returns `true` when the slot was filled by this call.
    pub fn scan(&mut self, messages: &[ChatMessage]) -> bool {
        if self.current.is_some() {
            return false;
        }
        self.current = messages.iter().find_map(detect_in_message);
        self.current.is_some()
    }

    pub fn complete(&mut self, hash: &str) -> Option<PendingTransaction> {
        tracing::info!(hash, "mint transaction confirmed");
        self.current.take()
    }

    pub fn fail(&mut self, reason: &str) -> Option<PendingTransaction> {
        tracing::warn!(reason, "mint transaction failed");
        self.current.take()
    }
}

/// Where the mint card is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MintStatus {
    #[default]
    Ready,
    Signing,
    Confirmed(String),
    Failed(String),
}

impl MintStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MintStatus::Ready => "Ready to Mint",
            MintStatus::Signing => "Signing Transaction...",
            MintStatus::Confirmed(_) => "NFT Minted Successfully!",
            MintStatus::Failed(_) => "Transaction Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{MessagePart, ToolPart};
    use serde_json::json;

    // Key order matters for the prose pattern, so this is not built with `json!`.
    fn mint_json(function_name: &str) -> String {
        format!(
            r#"{{"success":true,"transaction":{{"to":"0x1111111111111111111111111111111111111111","data":"0x","value":"0"}},"metadata":{{"functionName":"{}","recipientAddress":"0x2222222222222222222222222222222222222222","contractAddress":"0x1111111111111111111111111111111111111111","tokenURI":"data:application/json;base64,eyJ9","estimatedGas":"150000","chainId":11011,"nftMetadata":{{"name":"My First Shape NFT","description":"A black circle"}}}}}}"#,
            function_name
        )
    }

    fn assistant_text(text: &str) -> ChatMessage {
        let mut message = ChatMessage::assistant("a1");
        message.push_text(text);
        message
    }

    #[test]
    fn test_whole_text_json() {
        let pending = detect_in_text(&mint_json("mintNFT")).unwrap();
        assert_eq!(pending.metadata.token_uri, "data:application/json;base64,eyJ9");
        assert_eq!(pending.chain_label(), "Shape Sepolia (Chain ID: 11011)");
        assert_eq!(pending.short_recipient(), "0x2222...2222");
        assert_eq!(pending.estimated_gas(), "150000");
    }

    #[test]
    fn test_fenced_block() {
        let text = format!("Here is your transaction:\n```json\n{}\n```\nSign it when ready.", mint_json("mintNFT"));
        let pending = detect_in_text(&text).unwrap();
        assert_eq!(
            pending.metadata.nft_metadata.unwrap().name.as_deref(),
            Some("My First Shape NFT")
        );
    }

    #[test]
    fn test_object_in_prose() {
        let text = format!("I prepared this for you: {} Let me know.", mint_json("mintNFT"));
        assert!(detect_in_text(&text).is_some());
    }

    #[test]
    fn test_other_function_is_ignored() {
        assert!(detect_in_text(&mint_json("burnNFT")).is_none());
        let text = format!("```json\n{}\n```", mint_json("transfer"));
        assert!(detect_in_text(&text).is_none());
    }

    #[test]
    fn test_success_false_is_ignored() {
        let text = mint_json("mintNFT").replace("\"success\":true", "\"success\":false");
        assert!(detect_in_text(&text).is_none());
    }

    #[test]
    fn test_bad_fenced_block_falls_through_to_prose() {
        let text = format!("```json\n{{not json\n```\nresult: {}", mint_json("mintNFT"));
        // The loose pattern spans from the first brace, so this only matches
        // when the prose candidate itself is valid JSON.
        assert!(detect_in_text(&text).is_none());

        let text = format!("```json\n[1, 2]\n```\nresult: {}", mint_json("mintNFT"));
        assert!(detect_in_text(&text).is_some());
    }

    #[test]
    fn test_user_messages_are_skipped() {
        let message = ChatMessage::user(&mint_json("mintNFT"));
        assert!(detect_in_message(&message).is_none());
    }

    fn tool_message(state: ToolState, output: Value) -> ChatMessage {
        let mut message = ChatMessage::assistant("a2");
        message.parts.push(MessagePart::Tool(ToolPart {
            tool_name: PREPARE_MINT_TOOL.to_string(),
            tool_call_id: "call_1".to_string(),
            state,
            input: Some(json!({})),
            output: Some(output),
            error_text: None,
        }));
        message
    }

    #[test]
    fn test_tool_part_output() {
        let message = tool_message(ToolState::OutputAvailable, json!(mint_json("mintNFT")));
        assert!(detect_in_message(&message).is_some());

        let mcp_result = json!({"content": [{"type": "text", "text": mint_json("mintNFT")}]});
        let message = tool_message(ToolState::OutputAvailable, mcp_result);
        assert!(detect_in_message(&message).is_some());

        let message = tool_message(ToolState::InputAvailable, json!(mint_json("mintNFT")));
        assert!(detect_in_message(&message).is_none());
    }

    #[test]
    fn test_slot_keeps_first_until_cleared() {
        let first = assistant_text(&mint_json("mintNFT"));
        let second_json = mint_json("mintNFT").replace("My First Shape NFT", "Second");
        let second = assistant_text(&second_json);

        let mut slot = PendingSlot::new();
        assert!(slot.scan(&[first.clone()]));
        assert!(!slot.scan(&[second.clone(), first.clone()]));
        let name = slot.current().and_then(|p| p.metadata.nft_metadata.as_ref()).and_then(|m| m.name.clone());
        assert_eq!(name.as_deref(), Some("My First Shape NFT"));

        assert!(slot.complete("0xhash").is_some());
        assert!(!slot.is_occupied());
        assert!(slot.scan(&[second]));
        assert!(slot.fail("user rejected").is_some());
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_mint_status_labels() {
        assert_eq!(MintStatus::default().label(), "Ready to Mint");
        assert_eq!(MintStatus::Signing.label(), "Signing Transaction...");
        assert_eq!(MintStatus::Confirmed("0x1".into()).label(), "NFT Minted Successfully!");
        assert_eq!(MintStatus::Failed("no".into()).label(), "Transaction Failed");
    }
}
