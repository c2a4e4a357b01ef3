//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT, SIGTERM or SIGQUIT
//! - Report which signal arrived so the daemon can log it

use std::io;

use tokio::signal::unix::{signal, SignalKind};

/// Resolves with the name of the first termination signal received.
pub async fn wait_for_shutdown_signal() -> io::Result<&'static str> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}
