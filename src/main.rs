pub mod config;
pub mod dispatch;
pub mod mqtt;
pub mod persistence;
pub mod sysfs;

#[cfg(test)]
mod testing;

use crate::config::BridgeConfig;
use crate::mqtt::lifecycle::{LifecycleManager, LifecycleSettings};
use crate::mqtt::mqtt_handler;
use crate::persistence::adapter_config;
use crate::sysfs::SysfsTool;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = BridgeConfig::load()
        .await
        .map_err(|e| eyre!("Unable to load configuration: {}", e))?;
    setup_logging(config.log_level()?);

    info!("Starting mtsio-bridge...");

    let (client, events) = mqtt_handler::connect(&config.mqtt)
        .map_err(|e| eyre!("Unable to initialize MQTT client: {}", e))?;

    let manager = LifecycleManager::new(
        events,
        Arc::new(client),
        Arc::new(SysfsTool::from_config(&config.tool)),
        adapter_config::from_settings(&config.adapter),
        LifecycleSettings::from(&config),
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal.cancel();
    });

    manager.run(shutdown).await;

    info!("mtsio-bridge stopped");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
