//! Shutdown: wait for SIGINT/SIGTERM, then disconnect the session once.

use crate::channels::ProtocolClient;
use crate::lifecycle::{self, Reconnect};
use anyhow::Result;
use std::future::Future;

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Keep `client` connected until `signal` completes, then disconnect it once. When the session
/// drops and cannot be restored, disconnects and returns that error instead.
pub async fn disconnect_on<F>(
    signal: F,
    client: &dyn ProtocolClient,
    reconnect: &Reconnect,
) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let outcome = tokio::select! {
        _ = signal => {
            log::info!("shutdown signal received, disconnecting");
            Ok(())
        }
        res = lifecycle::stay_connected(client, reconnect) => res,
    };
    client.disconnect().await;
    outcome
}
