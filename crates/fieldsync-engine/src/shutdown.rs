// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! SIGTERM and SIGINT (Ctrl+C) cancel a [`CancellationToken`] watched by the
//! sync loop and the health probe. An in-flight drain is given a grace
//! period to record its outcomes before the process exits.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fieldsync_core::FieldsyncError;

use crate::queue::QueueManager;

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a token that is cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, only Ctrl+C will stop");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Wait up to `grace` for the sync loop to stop, then release any claim it
/// still holds so the next drain sends those items again. Claims held by
/// other processes are left alone.
pub async fn drain_sync_loop(
    task: JoinHandle<Result<(), FieldsyncError>>,
    queue: &QueueManager,
    grace: Duration,
) -> Result<(), FieldsyncError> {
    match tokio::time::timeout(grace, task).await {
        Ok(Ok(Ok(()))) => info!("sync loop drained"),
        Ok(Ok(Err(e))) => warn!(error = %e, "sync loop exited with an error"),
        Ok(Err(e)) => warn!(error = %e, "sync loop task panicked or was aborted"),
        Err(_) => warn!(grace = ?grace, "sync loop did not stop in time, abandoning in-flight drain"),
    }

    let released = queue.release_held().await?;
    if released > 0 {
        info!(released, "released interrupted claims");
    }
    Ok(())
}
