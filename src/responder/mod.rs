//! Responding side of the cluster processlist protocol
//!
//! Each instance watches the compute-node subtree. A trigger key addressed to
//! the instance makes it act locally and delete the key; the deletion of any
//! trigger key wakes the coordinator round waiting on that task, wherever it
//! runs.

pub mod process_responder;
pub mod watcher;

pub use process_responder::{ProcessResponder, ResponderHandle};
pub use watcher::{CompletionSignaller, TriggerWatcher};

use crate::core::errors::Result;
use async_trait::async_trait;

/// Typed callbacks for trigger activity observed in the registry
#[async_trait]
pub trait ProcessTriggerHandler: Send + Sync {
    /// A "show processlist" trigger appeared for `instance_id`
    async fn on_show_process_list_trigger(&self, instance_id: &str, task_id: &str) -> Result<()>;

    /// A "kill process" trigger appeared for `instance_id`
    async fn on_kill_process_trigger(&self, instance_id: &str, process_id: &str) -> Result<()>;

    /// Some instance cleared its "show processlist" trigger for `task_id`
    async fn on_show_process_list_completed(&self, task_id: &str);

    /// Some instance cleared its "kill process" trigger for `process_id`
    async fn on_kill_process_completed(&self, process_id: &str);
}
