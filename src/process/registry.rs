use super::snapshot::ProcessSnapshot;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// A SQL process running on this instance
#[derive(Debug)]
pub struct Process {
    id: String,
    start_millis: i64,
    database_name: Option<String>,
    username: Option<String>,
    hostname: Option<String>,
    sql: Option<String>,
    total_unit_count: AtomicU32,
    completed_unit_count: AtomicU32,
    idle: AtomicBool,
    interrupted: AtomicBool,
}

impl Process {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start_millis: chrono::Utc::now().timestamp_millis(),
            database_name: None,
            username: None,
            hostname: None,
            sql: None,
            total_unit_count: AtomicU32::new(0),
            completed_unit_count: AtomicU32::new(0),
            idle: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
        }
    }

    pub fn with_database(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = Some(database_name.into());
        self
    }

    pub fn with_user(mut self, username: impl Into<String>, hostname: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_sql(mut self, sql: impl Into<String>, total_unit_count: u32) -> Self {
        self.sql = Some(sql.into());
        self.total_unit_count.store(total_unit_count, Ordering::Relaxed);
        self
    }

    pub fn with_start_millis(mut self, start_millis: i64) -> Self {
        self.start_millis = start_millis;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record one finished execution unit
    pub fn complete_unit(&self) {
        self.completed_unit_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_idle(&self, idle: bool) {
        self.idle.store(idle, Ordering::Relaxed);
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            id: self.id.clone(),
            start_millis: self.start_millis,
            database_name: self.database_name.clone(),
            username: self.username.clone(),
            hostname: self.hostname.clone(),
            sql: self.sql.clone(),
            total_unit_count: self.total_unit_count.load(Ordering::Relaxed),
            completed_unit_count: self.completed_unit_count.load(Ordering::Relaxed),
            idle: self.idle.load(Ordering::Relaxed),
        }
    }
}

/// Processes running on this instance, keyed by process id
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    processes: Arc<DashMap<String, Arc<Process>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, process: Process) -> Arc<Process> {
        let process = Arc::new(process);
        self.processes
            .insert(process.id().to_string(), Arc::clone(&process));
        debug!(process_id = %process.id(), "Process registered");
        process
    }

    pub fn get(&self, id: &str) -> Option<Arc<Process>> {
        self.processes.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Process>> {
        self.processes.remove(id).map(|(_, process)| process)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Snapshots of every local process, ordered by start time then id
    pub fn list_snapshots(&self) -> Vec<ProcessSnapshot> {
        let mut snapshots: Vec<ProcessSnapshot> = self
            .processes
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| {
            a.start_millis
                .cmp(&b.start_millis)
                .then_with(|| a.id.cmp(&b.id))
        });
        snapshots
    }

    /// Interrupt and drop a local process. Returns false if it is not here.
    pub fn kill(&self, id: &str) -> bool {
        match self.remove(id) {
            Some(process) => {
                process.interrupt();
                info!(process_id = %id, "Killed local process");
                true
            }
            None => false,
        }
    }
}
