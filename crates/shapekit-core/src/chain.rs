//! Shape network selection and plain JSON-RPC plumbing.
//!
//! Both the chain RPC (Alchemy) and the wallet endpoint speak Ethereum
//! JSON-RPC, so they share [`RpcClient`].

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Shape,
    ShapeSepolia,
}

impl Network {
    pub fn from_chain_id(id: u64) -> Option<Self> {
        match id {
            360 => Some(Network::Shape),
            11011 => Some(Network::ShapeSepolia),
            _ => None,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Shape => 360,
            Network::ShapeSepolia => 11011,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Shape => "Shape",
            Network::ShapeSepolia => "Shape Sepolia",
        }
    }

    fn alchemy_root(&self) -> &'static str {
        match self {
            Network::Shape => "shape-mainnet",
            Network::ShapeSepolia => "shape-sepolia",
        }
    }

    pub fn rpc_url(&self, alchemy_key: &str) -> String {
        format!("https://{}.g.alchemy.com/v2/{}", self.alchemy_root(), alchemy_key)
    }

    pub fn nft_api_url(&self, alchemy_key: &str) -> String {
        format!("https://{}.g.alchemy.com/nft/v3/{}", self.alchemy_root(), alchemy_key)
    }

    pub fn explorer_tx_url(&self, hash: &str) -> String {
        match self {
            Network::Shape => format!("https://shapescan.xyz/tx/{}", hash),
            Network::ShapeSepolia => format!("https://sepolia.shapescan.xyz/tx/{}", hash),
        }
    }
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Cannot reach RPC endpoint: {0}")]
    Transport(String),

    #[error("RPC endpoint returned HTTP {0}")]
    Status(u16),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected RPC response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Malformed(err.to_string())
    }
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    url: String,
    next_id: std::sync::Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(url: &str) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            next_id: std::sync::Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(RpcError::Status(response.status().as_u16()));
        }

        let envelope: RpcEnvelope = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }

    /// Balance of `address` at the latest block, in wei.
    pub async fn get_balance(&self, address: &str) -> Result<u128, RpcError> {
        let result = self.call("eth_getBalance", json!([address, "latest"])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| RpcError::Malformed("eth_getBalance returned non-string result".to_string()))?;
        parse_quantity(hex)
    }
}

/// Parse a `0x`-prefixed JSON-RPC quantity.
pub fn parse_quantity(hex: &str) -> Result<u128, RpcError> {
    let clean = hex.strip_prefix("0x").unwrap_or(hex);
    if clean.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(clean, 16)
        .map_err(|e| RpcError::Malformed(format!("invalid quantity {}: {}", hex, e)))
}

/// Format a wei amount as ETH with `decimals` fractional digits (truncated).
pub fn format_ether(wei: u128, decimals: usize) -> String {
    const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;
    let whole = wei / WEI_PER_ETH;
    let fraction = wei % WEI_PER_ETH;

    if decimals == 0 {
        return whole.to_string();
    }

    let digits = format!("{:018}", fraction);
    let keep = decimals.min(18);
    format!("{}.{}", whole, &digits[..keep])
}

/// `true` for a `0x`-prefixed, 20-byte hex address.
pub fn is_address(value: &str) -> bool {
    match value.strip_prefix("0x") {
        Some(rest) => rest.len() == 40 && rest.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// `0x1234...abcd` style shortening used throughout the UI.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Client for the Alchemy NFT API of the configured Shape network.
#[derive(Clone)]
pub struct AlchemyNftClient {
    client: Client,
    base_url: String,
}

impl AlchemyNftClient {
    pub fn new(network: Network, alchemy_key: &str) -> Self {
        Self::with_base_url(&network.nft_api_url(alchemy_key))
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_nfts_for_owner(
        &self,
        owner: &str,
        contract_addresses: &[&str],
    ) -> Result<Value, RpcError> {
        let url = format!("{}/getNFTsForOwner", self.base_url);

        let mut query: Vec<(&str, &str)> = vec![("owner", owner), ("withMetadata", "true")];
        for contract in contract_addresses {
            query.push(("contractAddresses[]", contract));
        }

        let response = self.client.get(&url).query(&query).send().await?;
        if !response.status().is_success() {
            return Err(RpcError::Status(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_urls() {
        assert_eq!(
            Network::Shape.rpc_url("key"),
            "https://shape-mainnet.g.alchemy.com/v2/key"
        );
        assert_eq!(
            Network::ShapeSepolia.explorer_tx_url("0xabc"),
            "https://sepolia.shapescan.xyz/tx/0xabc"
        );
        assert_eq!(Network::from_chain_id(1), None);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0xde0b6b3a7640000").unwrap(), 1_000_000_000_000_000_000);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(1_500_000_000_000_000_000, 4), "1.5000");
        assert_eq!(format_ether(123_456_789_000_000, 6), "0.000123");
        assert_eq!(format_ether(2_000_000_000_000_000_000, 0), "2");
    }

    #[test]
    fn test_is_address() {
        assert!(is_address("0xf2e4b2a15872a20d0ffb336a89b94ba782ce9ba5"));
        assert!(!is_address("f2e4b2a15872a20d0ffb336a89b94ba782ce9ba5"));
        assert!(!is_address("0x1234"));
        assert!(!is_address("0xg2e4b2a15872a20d0ffb336a89b94ba782ce9ba5"));
    }

    #[test]
    fn test_short_address() {
        assert_eq!(
            short_address("0xf2e4b2a15872a20d0ffb336a89b94ba782ce9ba5"),
            "0xf2e4...9ba5"
        );
        assert_eq!(short_address("0x12"), "0x12");
    }

    #[tokio::test]
    async fn test_rpc_client_balance_against_local_node() {
        use axum::{routing::post, Json, Router};

        async fn node(Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(body["method"], "eth_getBalance");
            Json(json!({"jsonrpc": "2.0", "id": body["id"], "result": "0x2386f26fc10000"}))
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/", post(node))).await.unwrap();
        });

        let rpc = RpcClient::new(&format!("http://{}/", addr));
        let wei = rpc
            .get_balance("0xf2e4b2a15872a20d0ffb336a89b94ba782ce9ba5")
            .await
            .unwrap();
        assert_eq!(format_ether(wei, 2), "0.01");
    }
}
