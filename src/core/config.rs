use crate::core::errors::{ProcessListError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default watchdog window for one wait cycle
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration shared by the coordinator, the responder and the registry gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Maximum silent interval tolerated while triggers are outstanding
    pub wait_timeout: Duration,
    /// Buffered change notifications per in-memory registry
    pub event_capacity: usize,
    /// On-disk location of the sled registry (in-memory registry when unset)
    pub storage_path: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            event_capacity: 1024,
            storage_path: None,
        }
    }
}

impl ClusterConfig {
    /// Create a new builder for ClusterConfig
    pub fn builder() -> ClusterConfigBuilder {
        ClusterConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.wait_timeout.is_zero() {
            return Err(ProcessListError::configuration_field(
                "wait_timeout must be greater than 0",
                "wait_timeout",
            ));
        }
        if self.event_capacity == 0 {
            return Err(ProcessListError::configuration_field(
                "event_capacity must be greater than 0",
                "event_capacity",
            ));
        }
        Ok(())
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }
}

/// Builder for ClusterConfig
#[derive(Debug, Default)]
pub struct ClusterConfigBuilder {
    config: ClusterConfig,
}

impl ClusterConfigBuilder {
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.wait_timeout = timeout;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ClusterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
