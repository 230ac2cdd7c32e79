//! Wallet endpoint glue for the mint card.
//!
//! Signing happens in an external wallet reachable over JSON-RPC; this side
//! only builds the `mintNFT(address,string)` call and follows its receipt.

use alloy_primitives::keccak256;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::chain::{is_address, RpcClient, RpcError};
use crate::mint::PendingTransaction;

pub const MINT_SIGNATURE: &str = "mintNFT(address,string)";

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Please connect your wallet first")]
    NotConnected,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Wallet request failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("Transaction {0} reverted")]
    Reverted(String),

    #[error("Timed out waiting for transaction {0}")]
    ReceiptTimeout(String),
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

fn address_word(address: &str) -> Result<[u8; 32], WalletError> {
    if !is_address(address) {
        return Err(WalletError::InvalidAddress(address.to_string()));
    }
    let bytes = hex::decode(&address[2..]).map_err(|_| WalletError::InvalidAddress(address.to_string()))?;
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

fn uint_word(value: usize) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

/// ABI-encoded calldata for `mintNFT(recipient, tokenURI)`, `0x`-prefixed.
pub fn encode_mint_call(recipient: &str, token_uri: &str) -> Result<String, WalletError> {
    let uri = token_uri.as_bytes();
    let padded_len = uri.len().div_ceil(32) * 32;

    let mut data = Vec::with_capacity(4 + 32 * 3 + padded_len);
    data.extend_from_slice(&selector(MINT_SIGNATURE));
    data.extend_from_slice(&address_word(recipient)?);
    // Offset of the string tail, measured from the start of the arguments.
    data.extend_from_slice(&uint_word(64));
    data.extend_from_slice(&uint_word(uri.len()));
    data.extend_from_slice(uri);
    data.resize(4 + 32 * 3 + padded_len, 0);

    Ok(format!("0x{}", hex::encode(data)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub success: bool,
}

#[derive(Clone)]
pub struct WalletClient {
    rpc: RpcClient,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl WalletClient {
    pub fn new(url: &str) -> Self {
        Self {
            rpc: RpcClient::new(url),
            poll_interval: Duration::from_secs(2),
            receipt_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.receipt_timeout = timeout;
        self
    }

    /// Ask the wallet for its accounts; the first one is the connected address.
    pub async fn request_accounts(&self) -> Result<Vec<String>, WalletError> {
        let result = self.rpc.call("eth_requestAccounts", json!([])).await?;
        let accounts: Vec<String> = serde_json::from_value(result).map_err(RpcError::from)?;
        if accounts.is_empty() {
            return Err(WalletError::NotConnected);
        }
        Ok(accounts)
    }

    /// Send the prepared mint for signing. Returns the transaction hash.
    pub async fn send_mint(&self, from: Option<&str>, pending: &PendingTransaction) -> Result<String, WalletError> {
        let from = from.ok_or(WalletError::NotConnected)?;
        if !is_address(&pending.transaction.to) {
            return Err(WalletError::InvalidAddress(pending.transaction.to.clone()));
        }

        let data = encode_mint_call(&pending.metadata.recipient_address, &pending.metadata.token_uri)?;
        let tx = json!({
            "from": from,
            "to": pending.transaction.to,
            "data": data,
            "value": "0x0",
        });

        tracing::info!(to = %pending.transaction.to, "sending mint transaction to wallet");
        let result = self.rpc.call("eth_sendTransaction", json!([tx])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::Malformed("eth_sendTransaction returned no hash".to_string()).into())
    }

    pub async fn wait_for_receipt(&self, hash: &str) -> Result<Receipt, WalletError> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;

        loop {
            let result = self.rpc.call("eth_getTransactionReceipt", json!([hash])).await?;
            if let Some(receipt) = parse_receipt(hash, &result) {
                if !receipt.success {
                    return Err(WalletError::Reverted(hash.to_string()));
                }
                return Ok(receipt);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(WalletError::ReceiptTimeout(hash.to_string()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn parse_receipt(hash: &str, value: &Value) -> Option<Receipt> {
    if value.is_null() {
        return None;
    }
    let success = value.get("status").and_then(Value::as_str) == Some("0x1");
    let block_number = value
        .get("blockNumber")
        .and_then(Value::as_str)
        .and_then(|n| crate::chain::parse_quantity(n).ok())
        .map(|n| n as u64);

    Some(Receipt {
        transaction_hash: hash.to_string(),
        block_number,
        success,
    })
}
