//! # rollcall-server
//!
//! The rollcall agent binary.
//!
//! This binary:
//! - Loads configuration from `ROLLCALL_CONFIG` or the platform default path
//! - Starts the beacon scan session (unless `scan.auto_start = false`)
//! - Serves the local REST API until SIGINT/SIGTERM, then stops scanning
//!
//! ## Running
//!
//! ```bash
//! # Development, simulated radio
//! cargo run --package rollcall-server
//!
//! # Production, BlueZ radio
//! ROLLCALL_ENV=production ./rollcall-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use rollcall_core::{LoggingObserver, RollcallConfig};
use rollcall_server::state::AppState;
use rollcall_server::{api, logging, shutdown};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Environment variable overriding the configuration file path.
const CONFIG_PATH_ENV: &str = "ROLLCALL_CONFIG";

fn config_path() -> anyhow::Result<PathBuf> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => Ok(PathBuf::from(path)),
        None => RollcallConfig::default_path().context("Failed to determine config path"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path()?;
    let config = RollcallConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    logging::init(&config.logging, logging::is_production())?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting rollcall-server");
    info!(
        config = %path.display(),
        beacons = config.beacons.len(),
        service = %config.service.base_url,
        "Configuration loaded"
    );

    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .context("Invalid server.bind_address")?;
    let auto_start = config.scan.auto_start;

    let state = AppState::from_config(config)
        .context("Failed to build scan session")?
        .shared();
    info!(radio = state.radio_backend, "Radio backend selected");
    state.session.subscribe(Arc::new(LoggingObserver));

    if state.session.identity().is_none() {
        warn!("No identity configured; detections are ignored until a user signs in");
    }

    if auto_start {
        if let Err(e) = state.session.start().await {
            warn!(error = %e, "Scanning did not start; retry with POST /api/scan/start");
        }
    }

    let app = api::create_router(Arc::clone(&state));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
        .context("Server error")?;

    state.session.stop().await;
    info!("rollcall-server stopped");
    Ok(())
}
