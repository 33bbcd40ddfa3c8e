//! Shutdown coordination
//!
//! A cloneable drain flag shared by the listener and every connection.
//! Once triggered the process is draining: new connections and new lines
//! are answered with 421 and idle sessions are closed.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    draining: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            draining: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Signals every holder that the service is draining.
    pub fn trigger(&self) {
        self.draining.send_replace(true);
    }

    /// Checks if graceful shutdown has been requested
    pub fn is_draining(&self) -> bool {
        *self.draining.borrow()
    }

    /// Resolves once the service starts draining.
    pub async fn wait_for_drain(&self) {
        let mut draining = self.draining.subscribe();
        loop {
            let drained = *draining.borrow_and_update();
            // The sender lives in `self`, so `changed` only fails if it was dropped.
            if drained || draining.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_draining());

        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_drain().await });

        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_draining());
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.wait_for_drain().await;
    }
}
