//! Cooperative shutdown signal
//!
//! A shared "stop requested" flag plus a wake-up for anything currently
//! blocked in a poll. Cloning is cheap; all clones observe the same signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

#[derive(Debug, Default)]
struct ShutdownInner {
    requested: AtomicBool,
    notify: Notify,
}

/// Shutdown signal shared by every consumer loop
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter
    pub fn request(&self) {
        if !self.inner.requested.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested");
        }
        self.inner.notify.notify_waiters();
    }

    /// Check whether shutdown has been requested
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested
    pub async fn requested(&self) {
        loop {
            // Register before checking the flag so a concurrent request is not missed
            let notified = self.inner.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_wakes_waiter() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();

        let handle = tokio::spawn(async move { waiter.requested().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.request();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_requested_after_the_fact() {
        let shutdown = Shutdown::new();
        shutdown.request();
        shutdown.request();

        tokio::time::timeout(Duration::from_millis(100), shutdown.requested())
            .await
            .expect("already requested should resolve immediately");
    }
}
