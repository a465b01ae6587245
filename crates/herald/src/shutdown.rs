// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SIGINT/SIGTERM handling for the foreground service.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] cancelled when either signal arrives. The
/// handler task exits once the token is cancelled by anyone.
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
                        _ = token_clone.cancelled() => return,
                        _ = ctrl_c => info!("received SIGINT, stopping"),
                        _ = sigterm.recv() => info!("received SIGTERM, stopping"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "cannot install SIGTERM handler; only SIGINT stops the service");
                    tokio::select! {
                        _ = token_clone.cancelled() => return,
                        _ = ctrl_c => info!("received SIGINT, stopping"),
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = token_clone.cancelled() => return,
                _ = ctrl_c => info!("received Ctrl+C, stopping"),
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }
}
