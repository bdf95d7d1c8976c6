//! Cooperative shutdown signal shared by the driver, loop and trials

use tokio::sync::watch;

/// Sending half, owned by whoever listens for Ctrl-C
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half; cheap to clone into every component that may block
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            // Trigger dropped without firing
            std::future::pending::<()>().await;
        }
    }
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let (trigger, shutdown) = channel();
        let mut waiter = shutdown.clone();

        let task = tokio::spawn(async move {
            waiter.triggered().await;
        });

        assert!(!shutdown.is_triggered());
        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_does_not_fire() {
        let mut shutdown = Shutdown::never();
        let fired = tokio::time::timeout(Duration::from_secs(60), shutdown.triggered()).await;
        assert!(fired.is_err());
        assert!(!shutdown.is_triggered());
    }
}
