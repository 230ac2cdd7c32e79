//! Turn a raw [`ToolResponse`] into typed data or a message for the user.
//!
//! Nothing in here returns `Err`: every failure mode of the tool server ends up
//! as [`ToolOutcome::SoftError`] and is rendered inline by the caller.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::tool::ToolResponse;

const ERROR_PREFIX: &str = "Error:";
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome<T> {
    Ok(T),
    SoftError(String),
}

impl<T> ToolOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            ToolOutcome::Ok(value) => Some(value),
            ToolOutcome::SoftError(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolOutcome::Ok(_) => None,
            ToolOutcome::SoftError(message) => Some(message),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ToolOutcome<U> {
        match self {
            ToolOutcome::Ok(value) => ToolOutcome::Ok(f(value)),
            ToolOutcome::SoftError(message) => ToolOutcome::SoftError(message),
        }
    }
}

/// First `max` characters of `text`, never splitting a UTF-8 sequence.
pub fn preview(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Steps shared by the JSON and plain-text paths: envelope failure, missing
/// text, and the `Error:` prefix some tools use instead of JSON.
fn extract_text(response: &ToolResponse) -> Result<&str, String> {
    if !response.success {
        return Err(response
            .error
            .clone()
            .unwrap_or_else(|| "Tool call failed".to_string()));
    }

    let text = response
        .first_text()
        .ok_or_else(|| "Failed to parse server response".to_string())?;

    if text.starts_with(ERROR_PREFIX) {
        return Err(text.to_string());
    }

    Ok(text)
}

/// Plain-text tools such as `greet`.
pub fn normalize_text(response: &ToolResponse) -> ToolOutcome<String> {
    match extract_text(response) {
        Ok(text) => ToolOutcome::Ok(text.to_string()),
        Err(message) => ToolOutcome::SoftError(message),
    }
}

/// JSON tools: decode the text payload into `T`.
pub fn normalize<T: DeserializeOwned>(response: &ToolResponse) -> ToolOutcome<T> {
    let text = match extract_text(response) {
        Ok(text) => text,
        Err(message) => return ToolOutcome::SoftError(message),
    };

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                tool = response.tool_name.as_deref().unwrap_or("unknown"),
                "failed to decode tool payload: {}",
                e
            );
            return ToolOutcome::SoftError(format!(
                "Invalid JSON response: {}...",
                preview(text, PREVIEW_CHARS)
            ));
        }
    };

    if let Some(message) = embedded_error(&value) {
        return ToolOutcome::SoftError(message);
    }

    match serde_json::from_value::<T>(value) {
        Ok(data) => ToolOutcome::Ok(data),
        Err(e) => {
            tracing::warn!(
                tool = response.tool_name.as_deref().unwrap_or("unknown"),
                "tool payload did not match the expected schema: {}",
                e
            );
            ToolOutcome::SoftError("Invalid response format".to_string())
        }
    }
}

/// `{"error": true, "message": "..."}` style payloads.
fn embedded_error(value: &Value) -> Option<String> {
    let flag = value.get("error")?;
    let is_set = match flag {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    };
    if !is_set {
        return None;
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| flag.as_str())
        .unwrap_or("Unknown error occurred");
    Some(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ToolContent;
    use crate::payloads::ShapeNftData;
    use crate::tool::ToolResult;

    fn text_response(text: &str) -> ToolResponse {
        ToolResponse::ok("getShapeNft", vec![ToolContent::text(text)])
    }

    #[test]
    fn test_failed_envelope_never_decodes_result() {
        let response = ToolResponse {
            success: false,
            // A decodable payload that must be ignored.
            result: Some(ToolResult {
                content: vec![ToolContent::text(r#"{"totalNfts": 1, "nfts": []}"#)],
            }),
            error: Some("MCP server unavailable".to_string()),
            tool_name: None,
        };

        let outcome = normalize::<ShapeNftData>(&response);
        assert_eq!(outcome, ToolOutcome::SoftError("MCP server unavailable".to_string()));
    }

    #[test]
    fn test_failed_envelope_without_message() {
        let response = ToolResponse::default();
        assert_eq!(
            normalize::<Value>(&response).error(),
            Some("Tool call failed")
        );
    }

    #[test]
    fn test_missing_text_is_parse_failure() {
        let response = ToolResponse::ok("getShapeNft", vec![]);
        assert_eq!(
            normalize::<Value>(&response).error(),
            Some("Failed to parse server response")
        );
    }

    #[test]
    fn test_error_prefix_skips_decoding() {
        let response = text_response("Error: address is not valid");
        assert_eq!(
            normalize::<Value>(&response),
            ToolOutcome::SoftError("Error: address is not valid".to_string())
        );
        assert_eq!(
            normalize_text(&response).error(),
            Some("Error: address is not valid")
        );
    }

    #[test]
    fn test_invalid_json_reports_truncated_prefix() {
        let garbage = format!("<html>{}</html>", "x".repeat(300));
        let outcome = normalize::<Value>(&text_response(&garbage));

        let message = outcome.error().unwrap();
        assert!(message.starts_with("Invalid JSON response: <html>xxx"));
        assert!(message.ends_with("..."));
        assert_eq!(message.len(), "Invalid JSON response: ".len() + 100 + 3);
    }

    #[test]
    fn test_embedded_error_message_surfaces() {
        let outcome = normalize::<Value>(&text_response(
            r#"{"error": true, "message": "Creator not found"}"#,
        ));
        assert_eq!(outcome.error(), Some("Creator not found"));

        let outcome = normalize::<Value>(&text_response(r#"{"error": true}"#));
        assert_eq!(outcome.error(), Some("Unknown error occurred"));

        let outcome = normalize::<Value>(&text_response(r#"{"error": "rate limited upstream"}"#));
        assert_eq!(outcome.error(), Some("rate limited upstream"));
    }

    #[test]
    fn test_false_error_flag_is_not_an_error() {
        let outcome = normalize::<Value>(&text_response(r#"{"error": false, "ok": 1}"#));
        assert!(outcome.ok().is_some());
    }

    #[test]
    fn test_schema_mismatch() {
        let outcome = normalize::<ShapeNftData>(&text_response(r#"{"unexpected": []}"#));
        assert_eq!(outcome.error(), Some("Invalid response format"));
    }

    #[test]
    fn test_typed_payload() {
        let outcome = normalize::<ShapeNftData>(&text_response(
            r#"{"ownerAddress":"0xabc","timestamp":"t","totalNfts":2,"nfts":[
                {"tokenId":"1","contractAddress":"0xdef","name":"One","imageUrl":null},
                {"tokenId":"2","contractAddress":"0xdef","name":null,"imageUrl":null}]}"#,
        ));
        let data = outcome.ok().unwrap();
        assert_eq!(data.summary(), "Found 2 NFTs (showing 2)");
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("hi", 10), "hi");
    }
}
