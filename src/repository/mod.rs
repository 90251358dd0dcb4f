//! Registry gateway
//!
//! A hierarchical, watchable key-value store. Keys are `/`-separated paths;
//! a path may exist only implicitly as the parent of other keys. The
//! coordinator uses the plain CRUD surface, the responder side additionally
//! subscribes to change notifications.

pub mod memory;
pub mod sled_repository;

pub use memory::MemoryRepository;
pub use sled_repository::SledRepository;

use crate::core::config::ClusterConfig;
use crate::core::errors::{ProcessListError, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What happened to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// A change notification delivered to watchers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChangedEvent {
    pub key: String,
    /// New value, `None` for deletions
    pub value: Option<String>,
    pub kind: ChangeKind,
}

impl DataChangedEvent {
    pub fn new(key: impl Into<String>, value: Option<String>, kind: ChangeKind) -> Self {
        Self {
            key: key.into(),
            value,
            kind,
        }
    }
}

/// Receives change notifications for a watched subtree, one at a time and in
/// write order.
#[async_trait]
pub trait DataChangedListener: Send + Sync {
    async fn on_change(&self, event: DataChangedEvent);
}

/// Registry gateway contract
#[async_trait]
pub trait PersistRepository: Send + Sync {
    /// Upsert a value
    async fn persist(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key and its whole subtree. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Direct child names under a path, sorted, empty if none
    async fn get_children_keys(&self, key: &str) -> Result<Vec<String>>;

    /// Value stored at exactly this path
    async fn get_directly(&self, key: &str) -> Result<Option<String>>;

    /// Deliver every change under `prefix` to `listener` until the handle is
    /// dropped or cancelled.
    async fn watch(&self, prefix: &str, listener: Arc<dyn DataChangedListener>) -> Result<WatchHandle>;
}

/// Keeps a watch subscription alive; dropping it stops delivery.
#[derive(Debug)]
pub struct WatchHandle {
    prefix: String,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub(crate) fn new(prefix: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self {
            prefix: prefix.into(),
            task,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Open the gateway described by the configuration: sled when a storage path
/// is set, in-memory otherwise.
pub fn open_repository(config: &ClusterConfig) -> Result<Arc<dyn PersistRepository>> {
    config.validate()?;
    match &config.storage_path {
        Some(path) => Ok(Arc::new(SledRepository::open(path)?)),
        None => Ok(Arc::new(MemoryRepository::with_capacity(config.event_capacity))),
    }
}

/// Watches are only accepted on absolute registry paths.
pub(crate) fn check_watch_prefix(prefix: &str) -> Result<()> {
    if !prefix.starts_with('/') {
        return Err(ProcessListError::watch(prefix, "prefix must be an absolute registry path"));
    }
    Ok(())
}

/// Prefix that selects the strict descendants of `key`
pub(crate) fn subtree_prefix(key: &str) -> String {
    format!("{}/", key.trim_end_matches('/'))
}

/// Collect the distinct first path segments of keys below `prefix`.
pub(crate) fn direct_children<'a, I>(prefix: &str, keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let children: BTreeSet<String> = keys
        .into_iter()
        .filter_map(|key| key.strip_prefix(prefix))
        .filter_map(|rest| rest.split('/').next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    children.into_iter().collect()
}
