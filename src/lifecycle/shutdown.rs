//! Shutdown coordination.

use tokio::sync::broadcast;

/// Process-wide stop signal.
///
/// The accept loop and the health monitor each hold a receiver. Once
/// triggered, the server stops accepting and hands draining over to its
/// `ConnectionTracker`.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe before spawning the task, or the trigger may be missed.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop every subscribed task.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_reach_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut monitor = shutdown.subscribe();

        let signal_handler = shutdown.clone();
        signal_handler.trigger();

        assert!(server.recv().await.is_ok());
        assert!(monitor.recv().await.is_ok());
    }

    #[test]
    fn trigger_without_subscribers_is_a_noop() {
        Shutdown::new().trigger();
    }
}
