//! Shutdown coordination.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::signals::wait_for_shutdown_signal;

/// Process-wide shutdown trigger.
///
/// Hands out the base lifetime passed to listen / serve through
/// [`ServeOptions`](crate::lifecycle::ServeOptions).
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// Triggers the shutdown on the first termination signal.
    pub fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                signal = wait_for_shutdown_signal() => {
                    match signal {
                        Ok(name) => tracing::info!(signal = name, "Shutdown signal received"),
                        Err(err) => tracing::error!(error = %err, "Signal handler failed, shutting down"),
                    }
                    token.cancel();
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_reaches_every_clone() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();
        let listener = shutdown.spawn_signal_listener();
        assert!(!shutdown.is_triggered());

        shutdown.clone().trigger();

        assert!(token.is_cancelled());
        shutdown.triggered().await;
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
    }
}
