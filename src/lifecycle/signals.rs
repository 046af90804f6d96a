//! OS signal handling.
//!
//! SIGINT and SIGTERM both mean graceful shutdown.

use tokio::signal::unix::{signal, SignalKind};

/// Resolve when the process is asked to terminate.
pub async fn wait_for_termination() -> std::io::Result<&'static str> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}
