// Core infrastructure modules
pub mod core {
    pub mod config;
    pub mod errors;
    pub mod logging;
}

pub mod lock;       // Operation locks and the task-id lock registry
pub mod node;       // Registry path conventions
pub mod process;    // Local process table and snapshot format
pub mod repository; // Registry gateway and its backends

// Requesting and responding sides of the protocol
pub mod coord;
pub mod responder;

// Re-exports for convenience
pub use crate::core::config::{ClusterConfig, ClusterConfigBuilder, DEFAULT_WAIT_TIMEOUT};
pub use crate::core::errors::{ProcessListError, Result};
pub use crate::core::logging::init_logging;

pub use coord::{ClusterProcessCoordinator, KillProcessResult, ProcessListResult, RoundState};
pub use lock::{LockRegistry, OperationLock};
pub use node::InstanceType;
pub use process::{Process, ProcessRegistry, ProcessSnapshot, YamlProcessList};
pub use repository::{MemoryRepository, PersistRepository, SledRepository};
pub use responder::{CompletionSignaller, ProcessResponder, ProcessTriggerHandler, ResponderHandle, TriggerWatcher};
