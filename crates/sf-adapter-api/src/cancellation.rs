//! Cooperative cancellation token: every adapter and scheduler
//! primitive checks this at I/O boundaries and between major steps instead
//! of relying on forceful interruption.

use std::sync::Arc;
use tokio::sync::Notify;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self {
            canceled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Signal cancellation to every clone of this token. Idempotent.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Resolves immediately if already canceled, otherwise waits for the
    /// next `cancel()` call.
    pub async fn canceled(&self) {
        if self.is_canceled() {
            return;
        }
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canceled_future_resolves_after_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_canceled());
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.canceled().await;
        });
        token.cancel();
        handle.await.unwrap();
        assert!(token.is_canceled());
    }

    #[tokio::test]
    async fn already_canceled_resolves_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(50), token.canceled())
            .await
            .expect("should resolve immediately");
    }
}
