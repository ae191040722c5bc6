//! Flow Bridge Server
//!
//! Serves the messaging platform's webhook and the encrypted Flow
//! data-exchange endpoint over HTTP. All settings come from the environment
//! (see [`flow_bridge::config`]); the listen port defaults to 5000.

use anyhow::Result;
use flow_bridge::config::BridgeConfig;
use flow_bridge::server::{run_http_server, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let config = BridgeConfig::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Flow Bridge Server...");

    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        key_loaded = config.has_key_source(),
        messenger = config.messenger.is_some(),
        areas_url = config.areas_url.as_deref().unwrap_or("<built-in>"),
        "Service state initialized"
    );

    run_http_server(state, config.port).await?;
    Ok(())
}
