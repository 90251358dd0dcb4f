use super::ProcessTriggerHandler;
use crate::core::errors::Result;
use crate::lock::LockRegistry;
use crate::node::{parse_trigger_key, TriggerKind};
use crate::repository::{ChangeKind, DataChangedEvent, DataChangedListener};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{trace, warn};

/// Turns registry change events under the compute-node root into
/// [`ProcessTriggerHandler`] calls.
///
/// A trigger written over a leftover key at the same path arrives as an
/// update and is handled like a new one.
pub struct TriggerWatcher {
    handler: Arc<dyn ProcessTriggerHandler>,
}

impl TriggerWatcher {
    pub fn new(handler: Arc<dyn ProcessTriggerHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl DataChangedListener for TriggerWatcher {
    async fn on_change(&self, event: DataChangedEvent) {
        let Some(trigger) = parse_trigger_key(&event.key) else {
            trace!(key = %event.key, "Ignoring non-trigger change");
            return;
        };
        let result = match (trigger.kind, event.kind) {
            (TriggerKind::ShowProcessList, ChangeKind::Added | ChangeKind::Updated) => {
                self.handler
                    .on_show_process_list_trigger(&trigger.instance_id, &trigger.task_id)
                    .await
            }
            (TriggerKind::KillProcess, ChangeKind::Added | ChangeKind::Updated) => {
                self.handler
                    .on_kill_process_trigger(&trigger.instance_id, &trigger.task_id)
                    .await
            }
            (TriggerKind::ShowProcessList, ChangeKind::Deleted) => {
                self.handler.on_show_process_list_completed(&trigger.task_id).await;
                Ok(())
            }
            (TriggerKind::KillProcess, ChangeKind::Deleted) => {
                self.handler.on_kill_process_completed(&trigger.task_id).await;
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(key = %event.key, error = %e, "Trigger handler failed");
        }
    }
}

/// Handler for a node that only coordinates: ignores trigger actions and
/// signals the lock registry when any trigger is cleared.
pub struct CompletionSignaller {
    locks: LockRegistry,
}

impl CompletionSignaller {
    pub fn new(locks: LockRegistry) -> Self {
        Self { locks }
    }
}

#[async_trait]
impl ProcessTriggerHandler for CompletionSignaller {
    async fn on_show_process_list_trigger(&self, _instance_id: &str, _task_id: &str) -> Result<()> {
        Ok(())
    }

    async fn on_kill_process_trigger(&self, _instance_id: &str, _process_id: &str) -> Result<()> {
        Ok(())
    }

    async fn on_show_process_list_completed(&self, task_id: &str) {
        self.locks.notify(task_id);
    }

    async fn on_kill_process_completed(&self, process_id: &str) {
        self.locks.notify(process_id);
    }
}
