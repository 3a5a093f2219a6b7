//! Cross-thread wakeup and shutdown coordination
//!
//! Two primitives back the consumer shutdown protocol: [`WakeupToken`]
//! interrupts a blocked `poll` from another thread, and [`ShutdownLatch`]
//! lets the requesting thread wait until the poll loop has finished its own
//! cleanup before proceeding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cooperative cancellation signal for a blocked `poll`.
///
/// `wake` may be called from any thread, any number of times, including
/// before the first `poll`. The pending flag stays set until the polling
/// side consumes it by returning the wakeup outcome, so a wakeup issued
/// between polls is observed by the next poll immediately.
#[derive(Clone)]
pub struct WakeupToken {
    inner: Arc<WakeupInner>,
}

struct WakeupInner {
    pending: AtomicBool,
    notify: Notify,
}

impl WakeupToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WakeupInner {
                pending: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Request that the next (or current) blocked poll return the wakeup
    /// outcome. Safe to call concurrently with an in-progress poll.
    pub fn wake(&self) {
        self.inner.pending.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Whether a wakeup has been requested and not yet consumed.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Consume a pending wakeup, returning whether one was pending.
    pub(crate) fn take(&self) -> bool {
        self.inner.pending.swap(false, Ordering::AcqRel)
    }

    /// Resolve once a wakeup is pending. Used inside `select!` at the
    /// consumer's blocking points.
    pub(crate) async fn woken(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register with the notify list before re-checking the flag, so
            // a wake landing in between is not lost.
            notified.as_mut().enable();
            if self.is_pending() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for WakeupToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot broadcast latch.
///
/// `count_down` releases every current and future `wait`er exactly once;
/// calling it again is a no-op. The release/acquire pair on the flag makes
/// everything the releasing thread did before `count_down` visible to any
/// thread that returns from `wait`.
#[derive(Clone)]
pub struct ShutdownLatch {
    inner: Arc<LatchInner>,
}

struct LatchInner {
    released: AtomicBool,
    notify: Notify,
}

impl ShutdownLatch {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LatchInner {
                released: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Release the latch. Idempotent.
    pub fn count_down(&self) {
        if !self.inner.released.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether the latch has been released.
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Block until the latch is released. Returns immediately if it
    /// already was.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register with the notify list before re-checking the flag, so
            // a release landing in between is not lost.
            notified.as_mut().enable();
            if self.is_released() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ShutdownLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wake_before_wait_is_observed() {
        let token = WakeupToken::new();
        token.wake();
        // Must resolve without any further signal
        tokio::time::timeout(Duration::from_millis(100), token.woken())
            .await
            .expect("woken() should resolve for a pending wakeup");
        assert!(token.take());
        assert!(!token.is_pending());
    }

    #[tokio::test]
    async fn test_wake_unblocks_concurrent_waiter() {
        let token = WakeupToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.woken().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.wake();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be unblocked")
            .unwrap();
    }

    #[tokio::test]
    async fn test_latch_releases_all_waiters_once() {
        let latch = ShutdownLatch::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let latch = latch.clone();
                tokio::spawn(async move { latch.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!latch.is_released());
        latch.count_down();
        latch.count_down(); // second release is a no-op

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("latch waiter should be released")
                .unwrap();
        }
        assert!(latch.is_released());
    }

    #[tokio::test]
    async fn test_latch_wait_after_release_returns_immediately() {
        let latch = ShutdownLatch::new();
        latch.count_down();
        tokio::time::timeout(Duration::from_millis(100), latch.wait())
            .await
            .expect("wait on a released latch should not block");
    }
}
