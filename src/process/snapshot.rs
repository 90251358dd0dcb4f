use crate::core::errors::Result;
use serde::{Deserialize, Serialize};

/// Point-in-time view of one SQL process, as written to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub id: String,
    pub start_millis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default)]
    pub total_unit_count: u32,
    #[serde(default)]
    pub completed_unit_count: u32,
    #[serde(default)]
    pub idle: bool,
}

impl ProcessSnapshot {
    pub fn new(id: impl Into<String>, start_millis: i64) -> Self {
        Self {
            id: id.into(),
            start_millis,
            database_name: None,
            username: None,
            hostname: None,
            sql: None,
            total_unit_count: 0,
            completed_unit_count: 0,
            idle: false,
        }
    }
}

/// The per-instance result record: every local process of one instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YamlProcessList {
    #[serde(default)]
    pub processes: Vec<ProcessSnapshot>,
}

impl YamlProcessList {
    pub fn new(processes: Vec<ProcessSnapshot>) -> Self {
        Self { processes }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Merge records from many instances into one list, keeping the order
    /// in which the records are given.
    pub fn merge<'a, I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut processes = Vec::new();
        for record in records {
            if record.trim().is_empty() {
                continue;
            }
            processes.extend(Self::from_yaml(record)?.processes);
        }
        Ok(Self { processes })
    }
}
