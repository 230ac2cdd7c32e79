use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::{json, Value};
use shapekit_core::chain::is_address;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct GetNftsRequest {
    #[serde(default)]
    pub address: String,
}

/// Alchemy passthrough for the NFTs held by `address` on the configured network.
pub async fn get_nfts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GetNftsRequest>,
) -> (StatusCode, Json<Value>) {
    let address = request.address.trim();
    if !is_address(address) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Validation failed",
                "details": [{"path": ["address"], "message": "Invalid address"}],
            })),
        );
    }

    match state.nfts.get_nfts_for_owner(address, &[]).await {
        Ok(data) => (
            StatusCode::OK,
            Json(json!({"success": true, "data": data, "address": address})),
        ),
        Err(e) => {
            tracing::error!(%address, "NFT lookup failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to fetch NFTs"})),
            )
        }
    }
}

pub async fn robots(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = format!(
        "User-Agent: *\nAllow: /\n\nSitemap: {}/sitemap.xml\n",
        state.site_url
    );
    ([(header::CONTENT_TYPE, "text/plain")], body)
}
