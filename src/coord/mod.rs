//! Scatter/gather coordination of cluster-wide process requests
//!
//! The coordinator never talks to other instances directly. It leaves one
//! trigger key per online instance in the registry and waits for all of
//! them to be cleared.

pub mod coordinator;
pub mod types;

pub use coordinator::*;
pub use types::*;
