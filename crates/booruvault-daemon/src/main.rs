//! Booruvault daemon - local cache and favorites store for booru clients.

mod api;
mod config;
mod database;
mod error;
mod handler;
mod ipc;
mod sync;

use anyhow::{Context as _, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::handler::{handle_request, Context};

/// Daemon version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("booruvault=info".parse()?))
        .init();

    info!("Starting booruvault daemon v{}", VERSION);

    let config = config::Config::load()?;
    info!("Loaded configuration: {:?}", config);

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db = database::Database::open_at(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    db.migrate()?;
    info!("Database ready at {:?}", db.path());

    let ctx = Context {
        stores: database::Stores::new(&db),
        client: api::BooruClient::new(&config.api)?,
    };

    let (ipc_tx, mut ipc_rx) = tokio::sync::mpsc::channel::<ipc::IpcEvent>(100);
    let socket_path = booruvault_common::socket_path();
    let ipc_handle = tokio::spawn(async move {
        if let Err(e) = ipc::serve(socket_path, ipc_tx).await {
            error!("IPC server error: {}", e);
        }
    });

    info!("Daemon started, waiting for requests...");

    loop {
        tokio::select! {
            Some(event) = ipc_rx.recv() => {
                let response = handle_request(&ctx, event.request).await;
                let _ = event.response_tx.send(response);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    ipc_handle.abort();
    info!("Daemon stopped");
    Ok(())
}
