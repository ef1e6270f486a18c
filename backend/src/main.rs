use anyhow::Context;
use backend::{api, RelayConfig};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::parse();
    let engine = config.engine();
    match &engine {
        Some(engine) => info!(
            "[BACKEND] Bot moves served by {:?} at depth {}",
            engine.command.path, engine.settings.depth
        ),
        None => warn!("[BACKEND] STOCKFISH_PATH not set, /bot/move is disabled"),
    }

    let app = api::router(api::AppState::new(engine));
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!("[BACKEND] Relay listening on {}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("[BACKEND] Shutting down");
        })
        .await
        .context("relay server failed")?;
    Ok(())
}
