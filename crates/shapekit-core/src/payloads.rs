//! Canonical schemas for the JSON text returned by the Shape MCP tools.
//!
//! The tool server has shipped several shapes for the same payloads over time.
//! These types pin one of them; ETH-denominated values go through
//! [`EthAmount`] because they arrive as numbers or as numeric strings.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// An ETH amount that kept whatever textual precision the tool sent.
#[derive(Debug, Clone, PartialEq)]
pub struct EthAmount {
    raw: String,
    value: f64,
}

impl EthAmount {
    pub fn new(value: f64) -> Self {
        Self {
            raw: value.to_string(),
            value,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Original textual form, as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Renders the text the tool sent, so string amounts keep every digit.
impl fmt::Display for EthAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.raw)
    }
}

impl Default for EthAmount {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Serialize for EthAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

struct EthAmountVisitor;

impl<'de> Visitor<'de> for EthAmountVisitor {
    type Value = EthAmount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an ETH amount as a number or numeric string")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<EthAmount, E> {
        Ok(EthAmount::new(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<EthAmount, E> {
        Ok(EthAmount { raw: v.to_string(), value: v as f64 })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<EthAmount, E> {
        Ok(EthAmount { raw: v.to_string(), value: v as f64 })
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<EthAmount, E> {
        let trimmed = v.trim();
        let value = trimmed
            .parse::<f64>()
            .map_err(|_| E::custom(format!("not a numeric ETH amount: {}", v)))?;
        Ok(EthAmount { raw: trimmed.to_string(), value })
    }
}

impl<'de> Deserialize<'de> for EthAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EthAmountVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeNft {
    pub token_id: String,
    pub contract_address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Output of `getShapeNft`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeNftData {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub timestamp: String,
    pub total_nfts: u64,
    #[serde(default)]
    pub nfts: Vec<ShapeNft>,
}

impl ShapeNftData {
    pub fn summary(&self) -> String {
        format!("Found {} NFTs (showing {})", self.total_nfts, self.nfts.len())
    }
}

/// Output of `getShapeCreatorAnalytics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorAnalyticsData {
    pub creator_address: String,
    #[serde(default)]
    pub timestamp: String,
    pub has_tokens: bool,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(rename = "totalEarnedETH", default)]
    pub total_earned_eth: EthAmount,
    #[serde(rename = "currentBalanceETH", default)]
    pub current_balance_eth: EthAmount,
    #[serde(rename = "totalWithdrawnETH", default)]
    pub total_withdrawn_eth: EthAmount,
    #[serde(default)]
    pub registered_contracts: u64,
}

/// Output of `getCollectionAnalytics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionAnalyticsData {
    pub contract_address: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "floorPriceETH", default)]
    pub floor_price_eth: Option<EthAmount>,
    #[serde(rename = "sevenDayVolumeETH", default)]
    pub seven_day_volume_eth: Option<EthAmount>,
    #[serde(default)]
    pub seven_day_sales_count: Option<u64>,
    #[serde(rename = "averageSalePriceETH", default)]
    pub average_sale_price_eth: Option<EthAmount>,
    #[serde(default)]
    pub total_supply: Option<u64>,
    #[serde(rename = "marketCapETH", default)]
    pub market_cap_eth: Option<EthAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCreator {
    pub address: String,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(rename = "totalEarnedETH", default)]
    pub total_earned_eth: EthAmount,
    #[serde(rename = "currentBalanceETH", default)]
    pub current_balance_eth: EthAmount,
    #[serde(default)]
    pub registered_contracts: u64,
}

/// Output of `getTopShapeCreators`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCreatorsData {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub total_creators_analyzed: u64,
    #[serde(default)]
    pub top_creators: Vec<TopCreator>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedalsByTier {
    #[serde(default)]
    pub bronze: u64,
    #[serde(default)]
    pub silver: u64,
    #[serde(default)]
    pub gold: u64,
    #[serde(default)]
    pub special: u64,
}

/// Output of `getStackAchievements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackAchievementsData {
    pub user_address: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub has_stack: bool,
    #[serde(default)]
    pub total_medals: u64,
    #[serde(default)]
    pub medals_by_tier: MedalsByTier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eth_amount_accepts_number_and_string() {
        let from_number: EthAmount = serde_json::from_value(json!(0.25)).unwrap();
        let from_string: EthAmount = serde_json::from_value(json!("0.250000000000000001")).unwrap();
        let from_int: EthAmount = serde_json::from_value(json!(3)).unwrap();

        assert_eq!(from_number.value(), 0.25);
        assert_eq!(from_string.raw(), "0.250000000000000001");
        assert_eq!(from_string.to_string(), "0.250000000000000001 ETH");
        assert_eq!(from_number.to_string(), "0.25 ETH");
        assert_eq!(from_int.value(), 3.0);
    }

    #[test]
    fn test_eth_amount_rejects_non_numeric() {
        let result: Result<EthAmount, _> = serde_json::from_value(json!("lots"));
        assert!(result.is_err());
    }

    #[test]
    fn test_creator_analytics_mixed_numeric_types() {
        let data: CreatorAnalyticsData = serde_json::from_value(json!({
            "creatorAddress": "0xf2e4b2a15872a20d0ffb336a89b94ba782ce9ba5",
            "timestamp": "2025-01-01T00:00:00Z",
            "hasTokens": true,
            "totalTokens": 4,
            "totalEarnedETH": "1.234567",
            "currentBalanceETH": 0.5,
            "totalWithdrawnETH": 0,
            "registeredContracts": 2
        }))
        .unwrap();

        assert_eq!(data.total_earned_eth.to_string(), "1.234567 ETH");
        assert_eq!(data.current_balance_eth.value(), 0.5);
        assert_eq!(data.total_withdrawn_eth.value(), 0.0);
    }

    #[test]
    fn test_collection_nullable_fields() {
        let data: CollectionAnalyticsData = serde_json::from_value(json!({
            "contractAddress": "0xf2e4b2a15872a20d0ffb336a89b94ba782ce9ba5",
            "timestamp": "2025-01-01T00:00:00Z",
            "name": null,
            "floorPriceETH": null,
            "sevenDayVolumeETH": "12.5",
            "sevenDaySalesCount": 9,
            "averageSalePriceETH": null,
            "totalSupply": 1000,
            "marketCapETH": null
        }))
        .unwrap();

        assert!(data.name.is_none());
        assert!(data.floor_price_eth.is_none());
        assert_eq!(data.seven_day_volume_eth.unwrap().value(), 12.5);
    }

    #[test]
    fn test_nft_summary() {
        let data: ShapeNftData = serde_json::from_value(json!({
            "ownerAddress": "0xabc",
            "timestamp": "2025-01-01T00:00:00Z",
            "totalNfts": 14,
            "nfts": [{"tokenId": "1", "contractAddress": "0xdef", "name": null, "imageUrl": null}]
        }))
        .unwrap();
        assert_eq!(data.summary(), "Found 14 NFTs (showing 1)");
    }
}
