use std::sync::Arc;
use tokio::sync::watch;

/// Requests cancellation of every search holding one of its signals
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

/// Observes a [`CancelHandle`]
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: Some(self.sender.subscribe()),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self { receiver: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver.as_ref().is_some_and(|r| *r.borrow())
    }

    /// Resolves once cancellation is requested; pends forever if the handle
    /// is dropped without cancelling
    pub async fn cancelled(&self) {
        if let Some(receiver) = &self.receiver {
            let mut receiver = receiver.clone();
            if receiver.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let handle = CancelHandle::new();
        let signal = handle.signal();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn(async move { signal.cancelled().await });
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(handle.signal().is_cancelled());
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        let fired = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_fire() {
        let signal = CancelHandle::new().signal();
        let fired = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(fired.is_err());
    }
}
