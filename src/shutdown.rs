//! Graceful shutdown handling

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long the poller gets to finish its current cycle
pub const POLLER_GRACE: Duration = Duration::from_secs(5);

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Signal the poller and wait for it, bounded by `grace`
pub async fn stop_poller(tx: watch::Sender<bool>, handle: JoinHandle<()>, grace: Duration) {
    let _ = tx.send(true);

    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(())) => tracing::info!("Poller stopped cleanly"),
        Ok(Err(e)) => tracing::warn!("Poller task ended abnormally: {}", e),
        Err(_) => tracing::warn!(
            "Poller did not stop within {}s; abandoning it",
            grace.as_secs()
        ),
    }
}
