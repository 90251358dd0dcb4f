use super::{ProcessTriggerHandler, TriggerWatcher};
use crate::core::errors::{ProcessListError, Result};
use crate::lock::LockRegistry;
use crate::node::{self, InstanceType};
use crate::process::{ProcessRegistry, YamlProcessList};
use crate::repository::{PersistRepository, WatchHandle};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Answers trigger keys addressed to one local instance
pub struct ProcessResponder {
    instance_id: String,
    instance_type: InstanceType,
    repository: Arc<dyn PersistRepository>,
    processes: ProcessRegistry,
    locks: LockRegistry,
}

impl ProcessResponder {
    pub fn new(
        instance_id: impl Into<String>,
        instance_type: InstanceType,
        repository: Arc<dyn PersistRepository>,
        processes: ProcessRegistry,
        locks: LockRegistry,
    ) -> Result<Self> {
        let instance_id = instance_id.into();
        if instance_id.is_empty() || instance_id.contains(':') || instance_id.contains('/') {
            return Err(ProcessListError::validation_field(
                format!("invalid instance id '{}'", instance_id),
                "instance_id",
            ));
        }
        Ok(Self {
            instance_id,
            instance_type,
            repository,
            processes,
            locks,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    /// Watch the compute-node subtree, then announce this instance as online.
    pub async fn start(self: Arc<Self>) -> Result<ResponderHandle> {
        let watcher = Arc::new(TriggerWatcher::new(Arc::clone(&self) as Arc<dyn ProcessTriggerHandler>));
        let watch = self
            .repository
            .watch(node::compute_node_root(), watcher)
            .await?;
        let online_path = node::online_instance_path(self.instance_type, &self.instance_id);
        self.repository.persist(&online_path, "").await?;
        info!(
            instance_id = %self.instance_id,
            instance_type = self.instance_type.as_str(),
            "Process responder online"
        );
        Ok(ResponderHandle {
            repository: Arc::clone(&self.repository),
            online_path,
            watch,
        })
    }

    /// Publish the local process snapshot for `task_id`, then clear the trigger.
    pub async fn report_local_processes(&self, task_id: &str) -> Result<()> {
        let record = YamlProcessList::new(self.processes.list_snapshots());
        self.repository
            .persist(
                &node::process_list_instance_path(task_id, &self.instance_id),
                &record.to_yaml()?,
            )
            .await?;
        self.repository
            .delete(&node::process_trigger_path(&self.instance_id, task_id))
            .await?;
        self.locks.notify(task_id);
        debug!(
            instance_id = %self.instance_id,
            task_id = %task_id,
            processes = record.processes.len(),
            "Reported local processes"
        );
        Ok(())
    }

    /// Kill `process_id` if it runs here, then clear the trigger.
    pub async fn kill_local_process(&self, process_id: &str) -> Result<()> {
        let killed = self.processes.kill(process_id);
        self.repository
            .delete(&node::process_kill_path(&self.instance_id, process_id))
            .await?;
        self.locks.notify(process_id);
        debug!(instance_id = %self.instance_id, process_id = %process_id, killed, "Handled kill trigger");
        Ok(())
    }
}

#[async_trait]
impl ProcessTriggerHandler for ProcessResponder {
    async fn on_show_process_list_trigger(&self, instance_id: &str, task_id: &str) -> Result<()> {
        if instance_id != self.instance_id {
            return Ok(());
        }
        self.report_local_processes(task_id).await
    }

    async fn on_kill_process_trigger(&self, instance_id: &str, process_id: &str) -> Result<()> {
        if instance_id != self.instance_id {
            return Ok(());
        }
        self.kill_local_process(process_id).await
    }

    async fn on_show_process_list_completed(&self, task_id: &str) {
        self.locks.notify(task_id);
    }

    async fn on_kill_process_completed(&self, process_id: &str) {
        self.locks.notify(process_id);
    }
}

/// A started responder; keeps the watch alive
pub struct ResponderHandle {
    repository: Arc<dyn PersistRepository>,
    online_path: String,
    watch: WatchHandle,
}

impl ResponderHandle {
    pub fn is_watching(&self) -> bool {
        self.watch.is_active()
    }

    /// Leave the online roster and stop watching.
    pub async fn shutdown(self) -> Result<()> {
        self.repository.delete(&self.online_path).await?;
        self.watch.cancel();
        info!(path = %self.online_path, "Process responder offline");
        Ok(())
    }
}
