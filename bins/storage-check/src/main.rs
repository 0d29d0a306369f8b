//! PrintEasy storage check
//!
//! Loads storage configuration, builds the storage manager and verifies the
//! remote bucket is reachable. Exits non-zero if a configured remote store
//! cannot be reached.

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use printeasy_core::storage::{StorageConfig, StorageManager};
use printeasy_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "printeasy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = AppConfig::load().context("failed to load configuration")?;
    let config = StorageConfig::from_settings(&app_config.storage)
        .context("invalid storage configuration")?;

    let manager = StorageManager::from_config(&config)?;
    info!(
        local_root = %manager.local().root().display(),
        multipart_threshold = config.upload.multipart_threshold,
        part_size = config.upload.part_size,
        max_concurrent_parts = config.upload.max_concurrent_parts,
        "Storage configured"
    );

    let Some(client) = manager.remote() else {
        warn!("Remote object store not configured, only QR codes and chat attachments can be stored");
        return Ok(());
    };

    if manager.health_check().await {
        info!(bucket = %client.bucket(), "Remote object store reachable");
        Ok(())
    } else {
        error!(bucket = %client.bucket(), "Remote object store unreachable");
        std::process::exit(1);
    }
}
