use super::operation_lock::OperationLock;
use crate::core::errors::{ProcessListError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Task id → in-flight operation lock.
///
/// Cloning shares the same map: the coordinator and the responder side are
/// both handed a clone at construction time.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    locks: Arc<DashMap<String, Arc<OperationLock>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a lock for a task. Fails if the task already has a live lock.
    pub fn insert(&self, task_id: &str, lock: Arc<OperationLock>) -> Result<()> {
        match self.locks.entry(task_id.to_string()) {
            Entry::Occupied(_) => Err(ProcessListError::internal(format!(
                "task '{}' already has a live operation lock",
                task_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(lock);
                trace!(task_id = %task_id, "Operation lock registered");
                Ok(())
            }
        }
    }

    /// Insert a lock and get a handle that removes it again when dropped
    pub fn register(&self, task_id: &str, lock: Arc<OperationLock>) -> Result<LockRegistration> {
        self.insert(task_id, Arc::clone(&lock))?;
        Ok(LockRegistration {
            registry: self.clone(),
            task_id: task_id.to_string(),
            lock,
        })
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<OperationLock>> {
        self.locks.get(task_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, task_id: &str) -> Option<Arc<OperationLock>> {
        self.locks.remove(task_id).map(|(_, lock)| lock)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.locks.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Signal the lock of a task if one is in flight.
    pub fn notify(&self, task_id: &str) -> bool {
        // clone out first so no shard guard is held while waking
        match self.get(task_id) {
            Some(lock) => {
                lock.signal();
                debug!(task_id = %task_id, "Operation lock signaled");
                true
            }
            None => false,
        }
    }
}

/// Registration of one lock; removes exactly that lock from the registry on drop.
#[derive(Debug)]
pub struct LockRegistration {
    registry: LockRegistry,
    task_id: String,
    lock: Arc<OperationLock>,
}

impl LockRegistration {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn lock(&self) -> &Arc<OperationLock> {
        &self.lock
    }
}

impl Drop for LockRegistration {
    fn drop(&mut self) {
        let lock = &self.lock;
        self.registry
            .locks
            .remove_if(&self.task_id, |_, registered| Arc::ptr_eq(registered, lock));
        trace!(task_id = %self.task_id, "Operation lock removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_insert_lookup_remove() {
        let registry = LockRegistry::new();
        let lock = Arc::new(OperationLock::new(Duration::from_secs(1)));
        registry.insert("foo_id", Arc::clone(&lock)).unwrap();

        assert!(registry.contains("foo_id"));
        assert!(Arc::ptr_eq(&registry.get("foo_id").unwrap(), &lock));
        assert!(registry.remove("foo_id").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_one_live_lock_per_task() {
        let registry = LockRegistry::new();
        let _first = registry
            .register("foo_id", Arc::new(OperationLock::default()))
            .unwrap();
        let second = registry.register("foo_id", Arc::new(OperationLock::default()));
        assert!(second.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registration_removed_on_drop() {
        let registry = LockRegistry::new();
        {
            let registration = registry
                .register("foo_id", Arc::new(OperationLock::default()))
                .unwrap();
            assert_eq!(registration.task_id(), "foo_id");
            assert!(registry.contains("foo_id"));
        }
        assert!(!registry.contains("foo_id"));
    }

    #[test]
    fn test_stale_registration_keeps_newer_lock() {
        let registry = LockRegistry::new();
        let registration = registry
            .register("foo_id", Arc::new(OperationLock::default()))
            .unwrap();
        registry.remove("foo_id");
        let newer = Arc::new(OperationLock::default());
        registry.insert("foo_id", Arc::clone(&newer)).unwrap();

        drop(registration);
        assert!(Arc::ptr_eq(&registry.get("foo_id").unwrap(), &newer));
    }

    #[test]
    fn test_notify_unknown_task() {
        let registry = LockRegistry::new();
        assert!(!registry.notify("missing"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_notify_wakes_registered_waiter() {
        let registry = LockRegistry::new();
        let registration = registry
            .register("foo_id", Arc::new(OperationLock::new(Duration::from_secs(5))))
            .unwrap();
        let notifier = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            notifier.notify("foo_id");
        });

        let start = std::time::Instant::now();
        let lock = Arc::clone(registration.lock());
        let mut guard = lock.lock().await;
        assert!(guard.await_default_time().await);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
