use anyhow::{Context, Result};
use likeness_store::SqliteTemplateStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod stills;

use dbus_interface::{LikenessService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("likenessd starting");

    let config = config::Config::from_env().context("invalid configuration")?;
    tracing::info!(
        camera = %config.camera_device,
        model = %config.model_path.display(),
        db = %config.db_path.display(),
        threshold = config.threshold.value(),
        "configuration loaded"
    );

    let store = Arc::new(
        SqliteTemplateStore::open(&config.db_path).context("failed to open template store")?,
    );
    let engine = engine::spawn_engine(&config, Arc::clone(&store)).context("engine startup failed")?;
    let stills = stills::Stills::load(&config, Arc::clone(&store))
        .context("still-image pipeline startup failed")?;

    let service = LikenessService {
        engine,
        stills,
        store,
        threshold: config.threshold,
        camera_device: config.camera_device.clone(),
    };

    let builder = if config.session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on D-Bus")?;

    tracing::info!(bus = BUS_NAME, session = config.session_bus, "likenessd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("likenessd shutting down");

    Ok(())
}
