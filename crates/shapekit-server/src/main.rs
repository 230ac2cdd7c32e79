mod app;
mod chat;
mod nfts;
mod rate_limit;
mod tools;

use anyhow::{Context, Result};
use clap::Parser;
use shapekit_core::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::{AppState, CHAT_RATE_WINDOW};

#[derive(Parser)]
#[command(name = "shapekit-server")]
#[command(about = "Chat and MCP tool API for the Shape Network starter kit")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value = "3000")]
    port: u16,

    /// Overrides MCP_SERVER_URL.
    #[arg(long)]
    mcp_url: Option<String>,

    /// Overrides CHAT_MAX_STEPS.
    #[arg(long)]
    max_steps: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shapekit_server=debug,shapekit_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(url) = cli.mcp_url {
        config.mcp_server_url = url;
    }
    if let Some(steps) = cli.max_steps {
        config.max_steps = steps.max(1);
    }

    tracing::info!(
        environment = config.environment.as_str(),
        network = config.network().display_name(),
        mcp = %config.mcp_server_url,
        "configuration loaded"
    );

    let state = Arc::new(AppState::from_config(&config));

    let pruner = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHAT_RATE_WINDOW);
        loop {
            interval.tick().await;
            pruner.limiter.prune();
        }
    });

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(
        listener,
        app::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
