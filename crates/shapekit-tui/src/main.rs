use std::fs::{self, File};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use shapekit_core::config::{ClientSettings, DEFAULT_SERVER_URL};
use shapekit_core::{Config, RpcClient, WalletClient};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod app;
mod cache;
mod handler;
mod tui;
mod ui;

use api::ApiClient;
use app::App;

#[derive(Parser)]
#[command(name = "shapekit")]
#[command(about = "Terminal client for the Shape Network starter kit")]
struct Cli {
    /// Base URL of the kit server
    #[arg(short, long)]
    server: Option<String>,
    /// Use this wallet address instead of asking the wallet node
    #[arg(short, long)]
    wallet: Option<String>,
}

/// The terminal belongs to the UI, so logs go to `<cache dir>/shapekit/tui.log`.
fn init_logging() -> Result<()> {
    let Some(dir) = dirs::cache_dir().map(|d| d.join("shapekit")) else {
        return Ok(());
    };
    fs::create_dir_all(&dir)?;
    let file = File::create(dir.join("tui.log"))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "shapekit=debug,shapekit_core=info".into()))
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging().context("Failed to set up logging")?;

    let config = Config::client_from_env().context("Invalid configuration")?;
    let settings = ClientSettings::load().unwrap_or_default();

    let server_url = cli
        .server
        .or(settings.server_url)
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let wallet = cli.wallet.or(settings.wallet_address);
    let network = config.network();
    tracing::info!(server = %server_url, network = network.display_name(), "starting");

    let mut terminal = tui::init()?;
    tui::install_panic_hook();

    let mut events = tui::EventHandler::new();
    let mut app = App::new(
        ApiClient::new(&server_url),
        WalletClient::new(&config.wallet_rpc_url),
        RpcClient::new(&network.rpc_url(&config.alchemy_key)),
        network,
        wallet,
        events.sender(),
    );
    app.remember_wallet = true;
    app.start();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut tui::EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        if let Err(e) = handler::handle_event(app, event) {
            app.set_fatal(format!("{:#}", e));
        }
    }
    Ok(())
}
