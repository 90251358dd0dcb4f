//! Rendezvous between a blocked coordinator round and asynchronous
//! completion notifications.
//!
//! The locks are a wake-up optimization only. A woken waiter must re-derive
//! its readiness from the registry.

pub mod operation_lock;
pub mod registry;

pub use operation_lock::{OperationLock, OperationLockGuard};
pub use registry::{LockRegistration, LockRegistry};
