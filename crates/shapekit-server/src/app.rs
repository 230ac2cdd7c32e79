use axum::{
    routing::{get, post},
    Router,
};
use shapekit_core::ai::MAX_DURATION;
use shapekit_core::{AlchemyNftClient, Config, OpenAIClient};
use std::sync::Arc;
use std::time::Duration;

use crate::rate_limit::RateLimiter;
use crate::{chat, nfts, tools};

/// Chat requests allowed per client in each window.
pub const CHAT_RATE_LIMIT: u32 = 10;
pub const CHAT_RATE_WINDOW: Duration = Duration::from_secs(60);

pub struct AppState {
    pub mcp_url: String,
    pub llm: OpenAIClient,
    pub nfts: AlchemyNftClient,
    pub site_url: String,
    pub max_steps: usize,
    /// Upper bound on one chat answer, tool calls included.
    pub max_duration: Duration,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mcp_url: config.mcp_server_url.clone(),
            llm: OpenAIClient::new(
                &config.openai_api_key,
                &config.openai_base_url,
                &config.openai_model,
            ),
            nfts: AlchemyNftClient::new(config.network(), &config.alchemy_key),
            site_url: config.site_url.clone(),
            max_steps: config.max_steps,
            max_duration: MAX_DURATION,
            limiter: RateLimiter::new(CHAT_RATE_LIMIT, CHAT_RATE_WINDOW),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat::chat))
        .route(
            "/api/call-mcp-tool",
            get(tools::server_status).post(tools::call_tool),
        )
        .route("/api/get-nfts", post(nfts::get_nfts))
        .route("/robots.txt", get(nfts::robots))
        .with_state(state)
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::net::SocketAddr;

    pub fn state(mcp_url: &str, llm_base: &str) -> AppState {
        AppState {
            mcp_url: mcp_url.to_string(),
            llm: OpenAIClient::new("sk-test", llm_base, "gpt-4o"),
            nfts: AlchemyNftClient::with_base_url("http://127.0.0.1:9/nft/v3/key"),
            site_url: "https://kit.example".to_string(),
            max_steps: 5,
            max_duration: MAX_DURATION,
            limiter: RateLimiter::new(CHAT_RATE_LIMIT, CHAT_RATE_WINDOW),
        }
    }

    /// Serve `app` on an ephemeral port with client addresses attached.
    pub async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        format!("http://{}", addr)
    }
}
