use super::{
    check_watch_prefix, direct_children, subtree_prefix, ChangeKind, DataChangedEvent,
    DataChangedListener, PersistRepository, WatchHandle,
};
use crate::core::errors::Result;
use async_broadcast::{InactiveReceiver, RecvError, Sender};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// In-process registry gateway.
///
/// Values live in an ordered map; every mutation is broadcast to watchers
/// while the write lock is held, so watchers observe changes in write order.
/// A watcher that falls more than `capacity` events behind loses the oldest
/// ones and the loss is logged.
pub struct MemoryRepository {
    entries: RwLock<BTreeMap<String, String>>,
    events: Sender<DataChangedEvent>,
    // keeps the channel open while nobody is watching
    _idle: InactiveReceiver<DataChangedEvent>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (mut tx, rx) = async_broadcast::broadcast(capacity.max(1));
        tx.set_overflow(true); // Drop oldest events when full
        Self {
            entries: RwLock::new(BTreeMap::new()),
            events: tx,
            _idle: rx.deactivate(),
        }
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// All stored keys, in order
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    fn publish(&self, event: DataChangedEvent) {
        // Inactive means nobody is watching
        let _ = self.events.try_broadcast(event);
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistRepository for MemoryRepository {
    async fn persist(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let kind = match entries.insert(key.to_string(), value.to_string()) {
            Some(_) => ChangeKind::Updated,
            None => ChangeKind::Added,
        };
        self.publish(DataChangedEvent::new(key, Some(value.to_string()), kind));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let prefix = subtree_prefix(key);
        let mut removed: Vec<String> = entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        if entries.contains_key(key) {
            removed.push(key.to_string());
        }
        for each in removed {
            entries.remove(&each);
            debug!(key = %each, "Deleted registry key");
            self.publish(DataChangedEvent::new(each, None, ChangeKind::Deleted));
        }
        Ok(())
    }

    async fn get_children_keys(&self, key: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let prefix = subtree_prefix(key);
        let keys = entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.as_str());
        Ok(direct_children(&prefix, keys))
    }

    async fn get_directly(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn watch(&self, prefix: &str, listener: Arc<dyn DataChangedListener>) -> Result<WatchHandle> {
        check_watch_prefix(prefix)?;
        let mut rx = self.events.new_receiver();
        let watched = prefix.to_string();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if event.key.starts_with(&watched) {
                            listener.on_change(event).await;
                        }
                    }
                    Err(RecvError::Overflowed(skipped)) => {
                        warn!(prefix = %watched, skipped, "Watcher lagged, change events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(prefix = %watched, "Watch terminated");
        });
        Ok(WatchHandle::new(prefix, task))
    }
}
