//! Registry path conventions
//!
//! Every key the coordinator and the responders exchange lives under one of
//! two roots: `/nodes/compute_nodes` (roster and trigger mailboxes) and
//! `/execution_nodes` (per-task aggregation of process snapshots). The list
//! and kill mailboxes are separate subtrees so a kill id can never collide
//! with a list task id.

use serde::{Deserialize, Serialize};

const COMPUTE_NODE_ROOT: &str = "/nodes/compute_nodes";
const EXECUTION_NODE_ROOT: &str = "/execution_nodes";
const ONLINE_NODE: &str = "online";
const PROCESS_TRIGGER_NODE: &str = "process_trigger";
const PROCESS_KILL_NODE: &str = "process_kill";

/// Kind of compute instance registered in the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    Proxy,
    Jdbc,
}

impl InstanceType {
    pub fn all() -> [InstanceType; 2] {
        [InstanceType::Proxy, InstanceType::Jdbc]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Proxy => "proxy",
            InstanceType::Jdbc => "jdbc",
        }
    }
}

/// Which mailbox a trigger key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    ShowProcessList,
    KillProcess,
}

impl TriggerKind {
    fn node_name(&self) -> &'static str {
        match self {
            TriggerKind::ShowProcessList => PROCESS_TRIGGER_NODE,
            TriggerKind::KillProcess => PROCESS_KILL_NODE,
        }
    }
}

/// A trigger key decoded back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerKey {
    pub kind: TriggerKind,
    pub instance_id: String,
    pub task_id: String,
}

impl TriggerKey {
    pub fn path(&self) -> String {
        trigger_path(self.kind, &self.instance_id, &self.task_id)
    }
}

/// Root of everything compute-node related; watchers subscribe here
pub fn compute_node_root() -> &'static str {
    COMPUTE_NODE_ROOT
}

/// `/nodes/compute_nodes/online/{type}`
pub fn online_node_path(instance_type: InstanceType) -> String {
    format!("{}/{}/{}", COMPUTE_NODE_ROOT, ONLINE_NODE, instance_type.as_str())
}

/// `/nodes/compute_nodes/online/{type}/{instance_id}`
pub fn online_instance_path(instance_type: InstanceType, instance_id: &str) -> String {
    format!("{}/{}", online_node_path(instance_type), instance_id)
}

/// Mailbox root for one trigger kind
pub fn trigger_root(kind: TriggerKind) -> String {
    format!("{}/{}", COMPUTE_NODE_ROOT, kind.node_name())
}

/// `{trigger_root}/{instance_id}:{task_id}`
pub fn trigger_path(kind: TriggerKind, instance_id: &str, task_id: &str) -> String {
    format!("{}/{}:{}", trigger_root(kind), instance_id, task_id)
}

pub fn process_trigger_path(instance_id: &str, task_id: &str) -> String {
    trigger_path(TriggerKind::ShowProcessList, instance_id, task_id)
}

pub fn process_kill_path(instance_id: &str, process_id: &str) -> String {
    trigger_path(TriggerKind::KillProcess, instance_id, process_id)
}

/// `/execution_nodes/{task_id}`
pub fn process_id_path(task_id: &str) -> String {
    format!("{}/{}", EXECUTION_NODE_ROOT, task_id)
}

/// `/execution_nodes/{task_id}/{instance_id}`
pub fn process_list_instance_path(task_id: &str, instance_id: &str) -> String {
    format!("{}/{}", process_id_path(task_id), instance_id)
}

/// Decode a trigger key path, `None` for anything outside the two mailboxes.
pub fn parse_trigger_key(path: &str) -> Option<TriggerKey> {
    let rest = path.strip_prefix(COMPUTE_NODE_ROOT)?.strip_prefix('/')?;
    let (node, leaf) = rest.split_once('/')?;
    let kind = match node {
        PROCESS_TRIGGER_NODE => TriggerKind::ShowProcessList,
        PROCESS_KILL_NODE => TriggerKind::KillProcess,
        _ => return None,
    };
    let (instance_id, task_id) = leaf.split_once(':')?;
    if instance_id.is_empty() || task_id.is_empty() || task_id.contains('/') {
        return None;
    }
    Some(TriggerKey {
        kind,
        instance_id: instance_id.to_string(),
        task_id: task_id.to_string(),
    })
}
