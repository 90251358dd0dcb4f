//! Local process table and the snapshot format exchanged through the registry

pub mod registry;
pub mod rows;
pub mod snapshot;

pub use registry::{Process, ProcessRegistry};
pub use rows::{ProcessListRow, PROCESS_LIST_COLUMNS};
pub use snapshot::{ProcessSnapshot, YamlProcessList};
