use thiserror::Error;

/// Unified error type for cluster process coordination
#[derive(Debug, Error)]
pub enum ProcessListError {
    /// Registry gateway failures (unavailable store, IO errors)
    #[error("Registry operation failed: {operation} on '{path}'")]
    Repository {
        operation: String,
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Serialization errors
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Validation errors for caller-supplied input
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Watch registration or delivery errors
    #[error("Watch error on '{path}': {message}")]
    Watch { path: String, message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ProcessListError {
    /// Create a repository error
    pub fn repository<O: Into<String>, P: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        operation: O,
        path: P,
        source: E,
    ) -> Self {
        Self::Repository {
            operation: operation.into(),
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    /// Create a validation error with field
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error naming the offending field
    pub fn configuration_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a watch error
    pub fn watch<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Watch {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Check if retrying the failed call may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Repository { .. } | Self::Watch { .. } => true,
            Self::Serialization { .. } | Self::Validation { .. } | Self::Configuration { .. } => {
                false
            }
            Self::Internal { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Repository { .. } => "repository",
            Self::Serialization { .. } => "serialization",
            Self::Validation { .. } => "validation",
            Self::Configuration { .. } => "configuration",
            Self::Watch { .. } => "watch",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ProcessListError>;

impl From<std::io::Error> for ProcessListError {
    fn from(err: std::io::Error) -> Self {
        Self::repository("io_operation", "", err)
    }
}

impl From<sled::Error> for ProcessListError {
    fn from(err: sled::Error) -> Self {
        Self::repository("sled_operation", "", err)
    }
}

impl From<serde_yaml::Error> for ProcessListError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization("yaml", err)
    }
}

impl From<anyhow::Error> for ProcessListError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ProcessListError::repository(
            "persist",
            "/nodes/compute_nodes",
            std::io::Error::new(std::io::ErrorKind::Other, "down"),
        );
        assert!(matches!(err, ProcessListError::Repository { .. }));
        assert_eq!(err.category(), "repository");
        assert!(err.to_string().contains("/nodes/compute_nodes"));
    }

    #[test]
    fn test_error_recoverability() {
        assert!(ProcessListError::watch("/a", "closed").is_recoverable());
        assert!(!ProcessListError::configuration("bad").is_recoverable());
        assert!(!ProcessListError::internal("bug").is_recoverable());
    }

    #[test]
    fn test_yaml_conversion() {
        let err: ProcessListError = serde_yaml::from_str::<Vec<u32>>("{not: [a list")
            .unwrap_err()
            .into();
        assert_eq!(err.category(), "serialization");
    }
}
