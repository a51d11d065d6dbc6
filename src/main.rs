use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use yt_audio_relay::config::RelayConfig;
use yt_audio_relay::provision::{binary, cookies};
use yt_audio_relay::relay::tool::Tool;
use yt_audio_relay::server::handler::RelayServer;
use yt_audio_relay::server::state::AppState;

/// Grace period for open streams after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = RelayConfig::from_env();
    info!(
        "tool dir={} format={:?} player_client={:?} resolvers={}",
        config.tool_dir.display(),
        config.format,
        config.player_client,
        config.resolver_apis.len()
    );

    let cookie_path = cookies::setup_cookies(&config.cookies_path(), config.cookies.as_deref());

    let client = reqwest::Client::new();
    let binary_path = binary::provision(&client, &config).await;
    if binary_path.is_none() {
        warn!("no yt-dlp available; /stream will answer 503");
    }

    let addr = config.listen_addr();
    let tool = Arc::new(Tool::new(config, binary_path, cookie_path).with_reinstall(client.clone()));
    let state = AppState::from_config(tool, client);

    let server = RelayServer::start(addr, state).await?;
    info!("relay ready on port {}", server.port());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    if tokio::time::timeout(SHUTDOWN_GRACE, server.shutdown())
        .await
        .is_err()
    {
        warn!("streams still open after {:?}, exiting", SHUTDOWN_GRACE);
    }
    Ok(())
}
