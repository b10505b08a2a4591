//! Signal handling for graceful shutdown.

use tokio::sync::oneshot;
use tracing::{error, info};

/// Spawn a task that fires the returned receiver on SIGINT or SIGTERM
/// (Ctrl+C elsewhere).
pub fn setup_signal_handlers() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigint, mut sigterm) = match (
                signal(SignalKind::interrupt()),
                signal(SignalKind::terminate()),
            ) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                (Err(e), _) | (_, Err(e)) => {
                    error!(error = %e, "Failed to install signal handlers");
                    return;
                }
            };

            tokio::select! {
                _ = sigint.recv() => info!("Received SIGINT, initiating shutdown..."),
                _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown..."),
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            info!("Received Ctrl+C, initiating shutdown...");
        }

        let _ = tx.send(());
    });

    rx
}

/// Resolves once a shutdown signal has been received.
///
/// If the handlers could not be installed this never resolves, so the
/// server keeps running rather than exiting immediately.
pub async fn shutdown_signal() {
    if setup_signal_handlers().await.is_err() {
        std::future::pending::<()>().await;
    }
}
