use super::{
    check_watch_prefix, direct_children, subtree_prefix, ChangeKind, DataChangedEvent,
    DataChangedListener, PersistRepository, WatchHandle,
};
use crate::core::errors::{ProcessListError, Result};
use async_trait::async_trait;
use sled::{Event, IVec, Tree};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const REGISTRY_TREE: &str = "registry";

/// Registry gateway persisted in a sled tree.
///
/// sled reports every write as an insert, so watchers see `Added` both for
/// new keys and for overwrites.
pub struct SledRepository {
    db: sled::Db,
    tree: Tree,
}

impl SledRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| {
            ProcessListError::repository("open", path.display().to_string(), e)
        })?;
        info!(path = %path.display(), "Opened sled registry");
        Self::from_db(db)
    }

    /// A registry that is removed from disk when dropped
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(REGISTRY_TREE)?;
        Ok(Self { db, tree })
    }

    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| ProcessListError::repository("flush", REGISTRY_TREE, e))?;
        Ok(())
    }
}

fn decode(key: &str, bytes: &IVec) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ProcessListError::serialization(format!("utf8 value at {}", key), e))
}

fn to_event(event: Event) -> Option<DataChangedEvent> {
    match event {
        Event::Insert { key, value } => {
            let key = String::from_utf8(key.to_vec()).ok()?;
            let value = String::from_utf8(value.to_vec()).ok();
            Some(DataChangedEvent::new(key, value, ChangeKind::Added))
        }
        Event::Remove { key } => {
            let key = String::from_utf8(key.to_vec()).ok()?;
            Some(DataChangedEvent::new(key, None, ChangeKind::Deleted))
        }
    }
}

#[async_trait]
impl PersistRepository for SledRepository {
    async fn persist(&self, key: &str, value: &str) -> Result<()> {
        self.tree
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| ProcessListError::repository("persist", key, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let prefix = subtree_prefix(key);
        let mut removed = 0usize;
        for entry in self.tree.scan_prefix(prefix.as_bytes()).keys() {
            let child = entry.map_err(|e| ProcessListError::repository("delete", key, e))?;
            self.tree
                .remove(child)
                .map_err(|e| ProcessListError::repository("delete", key, e))?;
            removed += 1;
        }
        if self
            .tree
            .remove(key.as_bytes())
            .map_err(|e| ProcessListError::repository("delete", key, e))?
            .is_some()
        {
            removed += 1;
        }
        debug!(key = %key, removed, "Deleted registry subtree");
        Ok(())
    }

    async fn get_children_keys(&self, key: &str) -> Result<Vec<String>> {
        let prefix = subtree_prefix(key);
        let mut keys = Vec::new();
        for entry in self.tree.scan_prefix(prefix.as_bytes()).keys() {
            let raw = entry.map_err(|e| ProcessListError::repository("get_children_keys", key, e))?;
            keys.push(decode(key, &raw)?);
        }
        Ok(direct_children(&prefix, keys.iter().map(String::as_str)))
    }

    async fn get_directly(&self, key: &str) -> Result<Option<String>> {
        match self
            .tree
            .get(key.as_bytes())
            .map_err(|e| ProcessListError::repository("get_directly", key, e))?
        {
            Some(value) => Ok(Some(decode(key, &value)?)),
            None => Ok(None),
        }
    }

    async fn watch(&self, prefix: &str, listener: Arc<dyn DataChangedListener>) -> Result<WatchHandle> {
        check_watch_prefix(prefix)?;
        let mut subscriber = self.tree.watch_prefix(prefix.as_bytes());
        let watched = prefix.to_string();
        let task = tokio::spawn(async move {
            while let Some(event) = (&mut subscriber).await {
                match to_event(event) {
                    Some(change) => listener.on_change(change).await,
                    None => warn!(prefix = %watched, "Skipping change with non-utf8 key"),
                }
            }
            debug!(prefix = %watched, "Watch terminated");
        });
        Ok(WatchHandle::new(prefix, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelListener {
        tx: mpsc::UnboundedSender<DataChangedEvent>,
    }

    #[async_trait]
    impl DataChangedListener for ChannelListener {
        async fn on_change(&self, event: DataChangedEvent) {
            let _ = self.tx.send(event);
        }
    }

    #[tokio::test]
    async fn test_sled_crud_operations() {
        let repo = SledRepository::temporary().unwrap();
        repo.persist("/execution_nodes/t/a", "x").await.unwrap();
        repo.persist("/execution_nodes/t/b", "y").await.unwrap();
        repo.persist("/execution_nodes/t2/c", "z").await.unwrap();

        assert_eq!(
            repo.get_children_keys("/execution_nodes/t").await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(
            repo.get_directly("/execution_nodes/t/b").await.unwrap(),
            Some("y".to_string())
        );

        repo.delete("/execution_nodes/t").await.unwrap();
        assert!(repo.get_children_keys("/execution_nodes/t").await.unwrap().is_empty());
        assert_eq!(
            repo.get_children_keys("/execution_nodes").await.unwrap(),
            vec!["t2".to_string()]
        );
        assert!(repo.delete("/execution_nodes/t").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sled_watch_reports_removal() {
        let repo = SledRepository::temporary().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = repo
            .watch("/nodes", Arc::new(ChannelListener { tx }))
            .await
            .unwrap();

        repo.persist("/nodes/k", "").await.unwrap();
        repo.delete("/nodes/k").await.unwrap();

        let added = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(added.kind, ChangeKind::Added);
        let removed = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(removed.kind, ChangeKind::Deleted);
        assert_eq!(removed.key, "/nodes/k");
    }

    #[tokio::test]
    async fn test_watch_rejects_relative_prefix() {
        let repo = SledRepository::temporary().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = repo
            .watch("nodes", Arc::new(ChannelListener { tx }))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "watch");
    }
}
