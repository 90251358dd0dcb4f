//! Cluster process coordinator - scatter a request through the registry,
//! gather the acknowledgements.
//!
//! A round computes one trigger key per online instance, writes them all, and
//! waits on an [`OperationLock`] until every trigger key has been deleted by
//! its responder. Readiness is always re-read from the registry; a signal only
//! shortens the wait. A full wait window without any signal ends the round,
//! as not completed unless the registry shows every trigger cleared by then.
//! Cleanup runs on every exit path.

use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::coord::types::{KillProcessResult, ProcessListResult, RoundState};
use crate::core::config::ClusterConfig;
use crate::core::errors::{ProcessListError, Result};
use crate::lock::{LockRegistration, LockRegistry, OperationLock};
use crate::node::{self, InstanceType, TriggerKind};
use crate::repository::{PersistRepository, WatchHandle};
use crate::responder::{CompletionSignaller, TriggerWatcher};

/// Requesting side of the cluster processlist protocol
pub struct ClusterProcessCoordinator {
    repository: Arc<dyn PersistRepository>,
    locks: LockRegistry,
    config: ClusterConfig,
}

impl ClusterProcessCoordinator {
    pub fn new(
        repository: Arc<dyn PersistRepository>,
        locks: LockRegistry,
        config: ClusterConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repository,
            locks,
            config,
        })
    }

    /// Wake this coordinator's rounds when any node clears one of their
    /// triggers.
    ///
    /// A node that also runs a [`ProcessResponder`](crate::ProcessResponder)
    /// sharing this lock registry is already woken through it. A
    /// coordinator-only node calls this once and keeps the handle alive.
    pub async fn watch_completions(&self) -> Result<WatchHandle> {
        let signaller = Arc::new(CompletionSignaller::new(self.locks.clone()));
        let watch = self
            .repository
            .watch(node::compute_node_root(), Arc::new(TriggerWatcher::new(signaller)))
            .await?;
        debug!(prefix = %watch.prefix(), "Watching trigger completions");
        Ok(watch)
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Collect the process snapshots of every online instance.
    ///
    /// A round that times out is returned with `completed == false` and no
    /// records. Registry failures are returned as errors after cleanup.
    pub async fn show_process_list(&self) -> Result<ProcessListResult> {
        let task_id = new_task_id();
        let mut round = Round::new(
            Arc::clone(&self.repository),
            TriggerKind::ShowProcessList,
            task_id.clone(),
        );

        let outcome = async {
            let completed = self.trigger_and_wait(&mut round).await?;
            let records = if completed {
                self.collect_records(&task_id).await?
            } else {
                Vec::new()
            };
            Ok::<_, ProcessListError>((completed, records))
        }
        .await;
        round.clean_up().await;

        let (completed, records) = outcome?;
        info!(
            task_id = %task_id,
            completed,
            records = records.len(),
            "Show processlist round finished"
        );
        Ok(ProcessListResult {
            task_id,
            completed,
            records,
        })
    }

    /// Ask every online instance to kill `process_id` and wait for all of them.
    pub async fn kill_process(&self, process_id: &str) -> Result<KillProcessResult> {
        validate_process_id(process_id)?;
        let mut round = Round::new(
            Arc::clone(&self.repository),
            TriggerKind::KillProcess,
            process_id.to_string(),
        );

        let outcome = self.trigger_and_wait(&mut round).await;
        round.clean_up().await;

        let completed = outcome?;
        info!(process_id = %process_id, completed, "Kill process round finished");
        Ok(KillProcessResult {
            process_id: process_id.to_string(),
            completed,
        })
    }

    async fn trigger_and_wait(&self, round: &mut Round) -> Result<bool> {
        let trigger_paths = self.trigger_paths(round.kind, &round.task_id).await?;

        let lock = Arc::new(OperationLock::new(self.config.wait_timeout));
        round.registration = Some(self.locks.register(&round.task_id, Arc::clone(&lock))?);
        round.trigger_paths = trigger_paths;

        try_join_all(
            round
                .trigger_paths
                .iter()
                .map(|path| self.repository.persist(path, "")),
        )
        .await?;
        round.transition(RoundState::Triggered);
        info!(
            task_id = %round.task_id,
            kind = ?round.kind,
            targets = round.trigger_paths.len(),
            "Triggers issued"
        );

        round.transition(RoundState::Waiting);
        let mut guard = lock.lock().await;
        loop {
            if self.is_ready(&round.trigger_paths).await? {
                round.transition(RoundState::Completed);
                return Ok(true);
            }
            if !guard.await_default_time().await {
                if self.is_ready(&round.trigger_paths).await? {
                    debug!(task_id = %round.task_id, "Triggers cleared without a signal");
                    round.transition(RoundState::Completed);
                    return Ok(true);
                }
                round.transition(RoundState::TimedOut);
                warn!(
                    task_id = %round.task_id,
                    kind = ?round.kind,
                    window_ms = self.config.wait_timeout.as_millis() as u64,
                    "No completion signal within the wait window, round not completed"
                );
                return Ok(false);
            }
            debug!(task_id = %round.task_id, "Woken, re-checking triggers");
        }
    }

    async fn trigger_paths(&self, kind: TriggerKind, task_id: &str) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for instance_type in InstanceType::all() {
            let online = self
                .repository
                .get_children_keys(&node::online_node_path(instance_type))
                .await?;
            paths.extend(
                online
                    .iter()
                    .map(|instance_id| node::trigger_path(kind, instance_id, task_id)),
            );
        }
        Ok(paths)
    }

    async fn is_ready(&self, trigger_paths: &[String]) -> Result<bool> {
        for path in trigger_paths {
            if self.repository.get_directly(path).await?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn collect_records(&self, task_id: &str) -> Result<Vec<String>> {
        let mut records = Vec::new();
        for instance_id in self
            .repository
            .get_children_keys(&node::process_id_path(task_id))
            .await?
        {
            let path = node::process_list_instance_path(task_id, &instance_id);
            if let Some(record) = self.repository.get_directly(&path).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Fresh 128-bit random task id, hex without dashes
fn new_task_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn validate_process_id(process_id: &str) -> Result<()> {
    if process_id.is_empty() || process_id.contains('/') {
        return Err(ProcessListError::validation_field(
            format!("invalid process id '{}'", process_id),
            "process_id",
        ));
    }
    Ok(())
}

/// Registry and lock state owned by one in-flight round
struct Round {
    repository: Arc<dyn PersistRepository>,
    kind: TriggerKind,
    task_id: String,
    state: RoundState,
    trigger_paths: Vec<String>,
    registration: Option<LockRegistration>,
    started: Instant,
}

impl Round {
    fn new(repository: Arc<dyn PersistRepository>, kind: TriggerKind, task_id: String) -> Self {
        Self {
            repository,
            kind,
            task_id,
            state: RoundState::Idle,
            trigger_paths: Vec::new(),
            registration: None,
            started: Instant::now(),
        }
    }

    fn transition(&mut self, next: RoundState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal round transition {} -> {}",
            self.state,
            next
        );
        debug!(
            task_id = %self.task_id,
            from = %self.state,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Round transition"
        );
        self.state = next;
    }

    async fn clean_up(&mut self) {
        if self.kind == TriggerKind::ShowProcessList {
            best_effort_delete(self.repository.as_ref(), &node::process_id_path(&self.task_id)).await;
        }
        self.registration.take();
        if self.state != RoundState::Completed {
            for path in &self.trigger_paths {
                best_effort_delete(self.repository.as_ref(), path).await;
            }
        }
        self.transition(RoundState::CleanedUp);
    }
}

impl Drop for Round {
    fn drop(&mut self) {
        if self.state == RoundState::CleanedUp {
            return;
        }
        // Cancelled mid-round: the lock goes with the registration, the keys
        // are removed on a detached task.
        warn!(task_id = %self.task_id, state = %self.state, "Round dropped before cleanup");
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let repository = Arc::clone(&self.repository);
        let kind = self.kind;
        let task_id = self.task_id.clone();
        let completed = self.state == RoundState::Completed;
        let trigger_paths = std::mem::take(&mut self.trigger_paths);
        handle.spawn(async move {
            if kind == TriggerKind::ShowProcessList {
                best_effort_delete(repository.as_ref(), &node::process_id_path(&task_id)).await;
            }
            if !completed {
                for path in &trigger_paths {
                    best_effort_delete(repository.as_ref(), path).await;
                }
            }
        });
    }
}

async fn best_effort_delete(repository: &dyn PersistRepository, path: &str) {
    if let Err(e) = repository.delete(path).await {
        warn!(path = %path, error = %e, "Cleanup delete failed, ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Process, ProcessRegistry};
    use crate::repository::MemoryRepository;
    use crate::responder::ProcessResponder;
    use std::time::Duration;

    fn coordinator(repository: Arc<MemoryRepository>, window: Duration) -> ClusterProcessCoordinator {
        let config = ClusterConfig::builder().wait_timeout(window).build().unwrap();
        ClusterProcessCoordinator::new(repository, LockRegistry::new(), config).unwrap()
    }

    #[test]
    fn test_task_ids_are_unique_hex() {
        let a = new_task_id();
        let b = new_task_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_process_id() {
        assert!(validate_process_id("foo_id").is_ok());
        assert!(validate_process_id("").is_err());
        assert!(validate_process_id("a/b").is_err());
    }

    #[tokio::test]
    async fn test_no_online_instances_completes_immediately() {
        let repository = Arc::new(MemoryRepository::new());
        let coordinator = coordinator(Arc::clone(&repository), Duration::from_secs(5));

        let start = Instant::now();
        let result = coordinator.show_process_list().await.unwrap();
        assert!(result.completed);
        assert!(result.records.is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(repository.is_empty().await);
        assert!(coordinator.locks().is_empty());
    }

    #[tokio::test]
    async fn test_silent_instance_times_out_and_cleans_up() {
        let repository = Arc::new(MemoryRepository::new());
        repository
            .persist(&node::online_instance_path(InstanceType::Proxy, "silent"), "")
            .await
            .unwrap();
        let coordinator = coordinator(Arc::clone(&repository), Duration::from_millis(200));

        let start = Instant::now();
        let result = coordinator.kill_process("foo_id").await.unwrap();
        assert!(!result.completed);
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(
            repository
                .get_directly(&node::process_kill_path("silent", "foo_id"))
                .await
                .unwrap(),
            None
        );
        assert!(coordinator.locks().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_kill_round_is_rejected_without_touching_triggers() {
        let repository = Arc::new(MemoryRepository::new());
        repository
            .persist(&node::online_instance_path(InstanceType::Jdbc, "a"), "")
            .await
            .unwrap();
        let coordinator = coordinator(Arc::clone(&repository), Duration::from_secs(5));
        let trigger = node::process_kill_path("a", "foo_id");
        repository.persist(&trigger, "").await.unwrap();
        let _in_flight = coordinator
            .locks()
            .register("foo_id", Arc::new(OperationLock::default()))
            .unwrap();

        let err = coordinator.kill_process("foo_id").await.unwrap_err();
        assert_eq!(err.category(), "internal");
        assert_eq!(repository.get_directly(&trigger).await.unwrap(), Some(String::new()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cleared_triggers_complete_without_signal() {
        let repository = Arc::new(MemoryRepository::new());
        // The responder signals its own lock registry, never the coordinator's.
        let processes = ProcessRegistry::new();
        processes.add(Process::new("foo_id"));
        let responder = Arc::new(
            ProcessResponder::new(
                "a",
                InstanceType::Proxy,
                repository.clone(),
                processes,
                LockRegistry::new(),
            )
            .unwrap(),
        );
        let _handle = responder.start().await.unwrap();
        let coordinator = coordinator(Arc::clone(&repository), Duration::from_millis(300));

        let start = Instant::now();
        let result = coordinator.show_process_list().await.unwrap();
        assert!(result.completed);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.processes().unwrap().processes[0].id, "foo_id");
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(coordinator.locks().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_watch_completions_wakes_round_early() {
        let repository = Arc::new(MemoryRepository::new());
        let responder = Arc::new(
            ProcessResponder::new(
                "a",
                InstanceType::Proxy,
                repository.clone(),
                ProcessRegistry::new(),
                LockRegistry::new(),
            )
            .unwrap(),
        );
        let _handle = responder.start().await.unwrap();
        let coordinator = coordinator(Arc::clone(&repository), Duration::from_secs(5));
        let watch = coordinator.watch_completions().await.unwrap();
        assert!(watch.is_active());

        let start = Instant::now();
        let result = coordinator.kill_process("foo_id").await.unwrap();
        assert!(result.completed);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
