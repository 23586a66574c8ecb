use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// One-shot, idempotent cancellation handle.
///
/// Blocking socket operations race `wait()` against their I/O future; every
/// retry boundary also checks `is_interrupted()`. This replaces signal-driven
/// interruption with a flag the runtime can observe at suspension points.
#[derive(Clone, Default)]
pub struct Interrupter {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `interrupt` has been called. Safe against the
    /// register/notify race: the flag is re-checked after registration.
    pub async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        loop {
            if self.is_interrupted() {
                return;
            }
            notified.as_mut().enable();
            if self.is_interrupted() {
                return;
            }
            notified.as_mut().await;
            notified.set(self.inner.notify.notified());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_after_interrupt() {
        let interrupter = Interrupter::new();
        let waiter = interrupter.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        interrupter.interrupt();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("wait resolves")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_interrupted() {
        let interrupter = Interrupter::new();
        interrupter.interrupt();
        interrupter.interrupt(); // idempotent
        interrupter.wait().await;
        assert!(interrupter.is_interrupted());
    }
}
