//! OS signal handling.
//!
//! SIGINT (Ctrl+C) and SIGTERM both mean "shut down gracefully". If a
//! handler cannot be installed, that signal is logged and ignored; the
//! other one still works.

use std::future::pending;

/// Resolve with the name of the first termination signal received.
pub async fn wait_for_termination() -> &'static str {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGINT handler");
                pending().await
            }
        }
    };

    tokio::select! {
        signal = interrupt => signal,
        signal = terminate() => signal,
    }
}

#[cfg(unix)]
async fn terminate() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
            "SIGTERM"
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            pending().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() -> &'static str {
    pending().await
}
