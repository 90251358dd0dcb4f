//! Round state machine and round results

use crate::core::errors::Result;
use crate::process::{ProcessListRow, YamlProcessList};
use std::fmt;

/// Lifecycle of one coordination round.
///
/// `Idle → Triggered → Waiting → {Completed | TimedOut} → CleanedUp`, with
/// `CleanedUp` reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Triggered,
    Waiting,
    Completed,
    TimedOut,
    CleanedUp,
}

impl RoundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundState::Idle => "idle",
            RoundState::Triggered => "triggered",
            RoundState::Waiting => "waiting",
            RoundState::Completed => "completed",
            RoundState::TimedOut => "timed_out",
            RoundState::CleanedUp => "cleaned_up",
        }
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: RoundState) -> bool {
        use RoundState::*;
        matches!(
            (self, next),
            (_, CleanedUp)
                | (Idle, Triggered)
                | (Triggered, Waiting)
                | (Waiting, Completed)
                | (Waiting, TimedOut)
        ) && *self != CleanedUp
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a cluster-wide "show processlist" round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessListResult {
    pub task_id: String,
    /// `false` when some instance stayed silent for a whole wait window
    pub completed: bool,
    /// One serialized [`YamlProcessList`] per responding instance
    pub records: Vec<String>,
}

impl ProcessListResult {
    /// Parse and merge every record
    pub fn processes(&self) -> Result<YamlProcessList> {
        YamlProcessList::merge(self.records.iter().map(String::as_str))
    }

    /// Merged processes as `SHOW PROCESSLIST` rows
    pub fn rows(&self) -> Result<Vec<ProcessListRow>> {
        let now = chrono::Utc::now().timestamp_millis();
        Ok(self
            .processes()?
            .processes
            .iter()
            .map(|snapshot| ProcessListRow::from_snapshot(snapshot, now))
            .collect())
    }
}

/// Outcome of a cluster-wide "kill process" round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillProcessResult {
    pub process_id: String,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessSnapshot;

    #[test]
    fn test_state_transitions() {
        assert!(RoundState::Idle.can_transition_to(RoundState::Triggered));
        assert!(RoundState::Waiting.can_transition_to(RoundState::TimedOut));
        assert!(RoundState::Idle.can_transition_to(RoundState::CleanedUp));
        assert!(!RoundState::Idle.can_transition_to(RoundState::Completed));
        assert!(!RoundState::CleanedUp.can_transition_to(RoundState::CleanedUp));
        assert_eq!(RoundState::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn test_result_rows() {
        let record = YamlProcessList::new(vec![ProcessSnapshot::new("p1", 0)])
            .to_yaml()
            .unwrap();
        let result = ProcessListResult {
            task_id: "t".to_string(),
            completed: true,
            records: vec![record],
        };
        let rows = result.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "p1");
    }
}
