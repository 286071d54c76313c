//! Error handling for keel-log
//!
//! All sink operations return [`LogResult<T>`]. Failures crossing into the
//! pool are wrapped as creation or teardown errors of the sink's path.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for logging operations
pub type LogResult<T> = Result<T, LogError>;

/// Error type for logging operations
#[derive(Debug, Error)]
pub enum LogError {
    /// Reading or writing a log file failed
    #[error("IO error on '{path}': {source}", path = .path.display())]
    Io {
        /// The file involved
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// The sink pool reported an error
    #[error(transparent)]
    Resource(#[from] keel_resource::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filter parsing error
    #[error("Invalid filter: {0}")]
    Filter(String),

    /// A record could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl LogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from a lease that was already released.
    #[must_use]
    pub fn is_use_after_release(&self) -> bool {
        matches!(
            self,
            Self::Resource(keel_resource::Error::UseAfterRelease { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let err = LogError::io("/var/log/app.log", std::io::Error::other("disk full"));
        assert_eq!(err.to_string(), "IO error on '/var/log/app.log': disk full");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn resource_errors_are_transparent() {
        let inner = keel_resource::Error::UseAfterRelease {
            key: "\"a.log\"".to_string(),
        };
        let err = LogError::from(inner.clone());
        assert_eq!(err.to_string(), inner.to_string());
        assert!(err.is_use_after_release());
    }
}
