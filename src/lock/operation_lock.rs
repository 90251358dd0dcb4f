use crate::core::config::DEFAULT_WAIT_TIMEOUT;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, Notify};

/// Mutex plus condition with a fixed wait window.
///
/// Every [`signal`](OperationLock::signal) bumps an epoch before waking the
/// current waiters, so a signal that lands between a waiter's readiness check
/// and the start of its wait still counts: the wait returns `true` at once.
#[derive(Debug)]
pub struct OperationLock {
    mutex: Mutex<()>,
    notify: Notify,
    epoch: AtomicU64,
    wait_timeout: Duration,
}

impl OperationLock {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            mutex: Mutex::new(()),
            notify: Notify::new(),
            epoch: AtomicU64::new(0),
            wait_timeout,
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Acquire exclusive ownership. Dropping the guard unlocks.
    pub async fn lock(&self) -> OperationLockGuard<'_> {
        let guard = self.mutex.lock().await;
        OperationLockGuard {
            lock: self,
            guard: Some(guard),
            seen_epoch: self.epoch.load(Ordering::SeqCst),
        }
    }

    /// Wake every current waiter. Never blocks.
    pub fn signal(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

impl Default for OperationLock {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIMEOUT)
    }
}

/// Ownership of an [`OperationLock`]
pub struct OperationLockGuard<'a> {
    lock: &'a OperationLock,
    guard: Option<MutexGuard<'a, ()>>,
    seen_epoch: u64,
}

impl<'a> OperationLockGuard<'a> {
    /// Release the lock for at most one wait window.
    ///
    /// Returns `true` if the lock was signaled before the window elapsed,
    /// `false` on a silent timeout. The lock is held again on return either way.
    pub async fn await_default_time(&mut self) -> bool {
        let lock = self.lock;
        let notified = lock.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let current = lock.epoch.load(Ordering::SeqCst);
        if current != self.seen_epoch {
            self.seen_epoch = current;
            return true;
        }

        self.guard = None;
        let signaled = tokio::time::timeout(lock.wait_timeout, notified)
            .await
            .is_ok();
        self.guard = Some(lock.mutex.lock().await);
        self.seen_epoch = lock.epoch.load(Ordering::SeqCst);
        signaled
    }

    pub fn unlock(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_await_times_out_without_signal() {
        let lock = OperationLock::new(Duration::from_millis(100));
        let start = Instant::now();
        let mut guard = lock.lock().await;
        assert!(!guard.await_default_time().await);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_signal_wakes_waiter_early() {
        let lock = Arc::new(OperationLock::new(Duration::from_secs(5)));
        let signaller = Arc::clone(&lock);
        let start = Instant::now();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            signaller.signal();
        });

        let mut guard = lock.lock().await;
        assert!(guard.await_default_time().await);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_signal_before_wait_is_not_lost() {
        let lock = OperationLock::new(Duration::from_secs(5));
        let mut guard = lock.lock().await;
        lock.signal();
        let start = Instant::now();
        assert!(guard.await_default_time().await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_lock_released_while_waiting() {
        let lock = Arc::new(OperationLock::new(Duration::from_millis(200)));
        let other = Arc::clone(&lock);
        let mut guard = lock.lock().await;

        let contender = tokio::spawn(async move {
            let _held = other.lock().await;
            other.signal();
        });

        assert!(guard.await_default_time().await);
        guard.unlock();
        contender.await.unwrap();
    }
}
