//! Process-wide shutdown signal.
//!
//! A `watch` channel carrying `false` until shutdown is requested. Every
//! long-running task holds a receiver.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

/// Create the shutdown channel, initially not signalled.
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolve once shutdown has been requested.
///
/// If the sender is dropped without signalling, this never resolves.
pub async fn requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Wait for SIGINT (or SIGTERM on Unix), then flip `tx` to `true`.
pub async fn listen_for_signals(tx: Arc<watch::Sender<bool>>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = term.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }
    let _ = tx.send(true);
}
