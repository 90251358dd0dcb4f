use super::snapshot::ProcessSnapshot;

/// Column names of a MySQL-style `SHOW PROCESSLIST` result
pub const PROCESS_LIST_COLUMNS: [&str; 8] =
    ["Id", "User", "Host", "db", "Command", "Time", "State", "Info"];

/// One `SHOW PROCESSLIST` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessListRow {
    pub id: String,
    pub user: String,
    pub host: String,
    pub db: String,
    pub command: String,
    /// Seconds since the process started
    pub time: i64,
    pub state: String,
    pub info: String,
}

impl ProcessListRow {
    pub fn from_snapshot(snapshot: &ProcessSnapshot, now_millis: i64) -> Self {
        let (command, state) = if snapshot.idle {
            ("Sleep", String::new())
        } else if snapshot.total_unit_count == 0 {
            ("Execute", String::new())
        } else {
            (
                "Execute",
                format!(
                    "Executing {}/{}",
                    snapshot.completed_unit_count, snapshot.total_unit_count
                ),
            )
        };
        Self {
            id: snapshot.id.clone(),
            user: snapshot.username.clone().unwrap_or_default(),
            host: snapshot.hostname.clone().unwrap_or_default(),
            db: snapshot.database_name.clone().unwrap_or_default(),
            command: command.to_string(),
            time: ((now_millis - snapshot.start_millis) / 1000).max(0),
            state,
            info: snapshot.sql.clone().unwrap_or_default(),
        }
    }

    /// Values in `PROCESS_LIST_COLUMNS` order
    pub fn values(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.user.clone(),
            self.host.clone(),
            self.db.clone(),
            self.command.clone(),
            self.time.to_string(),
            self.state.clone(),
            self.info.clone(),
        ]
    }
}
