//! Cancellation primitives shared across the pipeline and the scanner.

use std::sync::Arc;
use tokio::sync::watch;

/// A token that can be used to signal cancellation across async tasks.
#[derive(Debug)]
pub struct CancellationToken {
    receiver: watch::Receiver<bool>,
}

/// A clonable handle that can check for cancellation.
#[derive(Debug, Clone)]
pub struct CancellationListener {
    receiver: Arc<watch::Receiver<bool>>,
}

/// Handle to trigger cancellation.
#[derive(Debug)]
pub struct CancellationHandle {
    sender: watch::Sender<bool>,
}

impl CancellationToken {
    /// Create a new cancellation token and its handle.
    pub fn new() -> (Self, CancellationHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { receiver: rx }, CancellationHandle { sender: tx })
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait asynchronously until cancellation is requested.
    pub async fn cancelled(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                // Sender was dropped, treat as cancellation
                return;
            }
        }
    }

    /// Create a listener that can be cloned and shared.
    pub fn listener(&self) -> CancellationListener {
        CancellationListener {
            receiver: Arc::new(self.receiver.clone()),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new().0
    }
}

impl CancellationListener {
    /// A listener that never fires; for callers without a deadline.
    pub fn never() -> Self {
        CancellationToken::new().0.listener()
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait asynchronously until cancellation is requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.as_ref().clone();
        while !*receiver.borrow() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl CancellationHandle {
    /// Signal cancellation to all associated tokens.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }

    /// Check if this handle is still connected to tokens.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn cancellation_basic() {
        let (mut token, handle) = CancellationToken::new();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        let result = timeout(Duration::from_millis(100), token.cancelled()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn listeners_share_state() {
        let (token, handle) = CancellationToken::new();
        let l1 = token.listener();
        let l2 = l1.clone();
        assert!(!l1.is_cancelled());
        handle.cancel();
        assert!(l1.is_cancelled());
        assert!(l2.is_cancelled());
    }

    #[tokio::test]
    async fn async_wait_observes_cancel() {
        let (mut token, handle) = CancellationToken::new();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_handle_counts_as_cancelled() {
        let (mut token, handle) = CancellationToken::new();
        drop(handle);
        let result = timeout(Duration::from_millis(100), token.cancelled()).await;
        assert!(result.is_ok());
    }
}
