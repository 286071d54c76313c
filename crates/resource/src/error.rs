//! Error types for the keyed resource pool
use std::sync::Arc;

use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Shared error source.
///
/// Sources are reference-counted so that one creation outcome can be
/// handed to every caller waiting on the same in-flight creation.
pub type Source = Arc<dyn std::error::Error + Send + Sync>;

/// Errors produced by the pool, its leases, and the resource contract.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// `Resource::create` failed for a key
    #[error("Creation failed for '{key}': {reason}")]
    CreationFailed {
        /// The key whose creation failed
        key: String,
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<Source>,
    },

    /// `Resource::teardown` failed at the zero-crossing
    #[error("Teardown failed for '{key}': {reason}")]
    TeardownFailed {
        /// The key whose teardown failed
        key: String,
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<Source>,
    },

    /// The resource was accessed through a lease that was already released
    #[error("Lease for '{key}' used after release")]
    UseAfterRelease {
        /// The key the lease was bound to
        key: String,
    },

    /// Pool configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// Bookkeeping invariant was violated
    #[error("Internal error for '{key}': {message}")]
    Internal {
        /// The key involved
        key: String,
        /// The error message
        message: String,
    },
}

impl Error {
    /// Create a creation failure without an underlying source.
    pub fn creation(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            key: key.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a creation failure wrapping `source`.
    pub fn creation_with<E>(key: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CreationFailed {
            key: key.into(),
            reason: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a teardown failure without an underlying source.
    pub fn teardown(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TeardownFailed {
            key: key.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a teardown failure wrapping `source`.
    pub fn teardown_with<E>(key: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TeardownFailed {
            key: key.into(),
            reason: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Normalise an error returned by `Resource::create`.
    ///
    /// A `CreationFailed` passes through untouched; anything else is
    /// wrapped so callers always observe `CreationFailed`.
    #[must_use]
    pub(crate) fn into_creation_failed(self, key: &str) -> Self {
        match self {
            err @ Self::CreationFailed { .. } => err,
            other => Self::CreationFailed {
                key: key.to_string(),
                reason: other.to_string(),
                source: Some(Arc::new(other)),
            },
        }
    }

    /// Normalise an error returned by `Resource::teardown`.
    #[must_use]
    pub(crate) fn into_teardown_failed(self, key: &str) -> Self {
        match self {
            err @ Self::TeardownFailed { .. } => err,
            other => Self::TeardownFailed {
                key: key.to_string(),
                reason: other.to_string(),
                source: Some(Arc::new(other)),
            },
        }
    }

    /// Whether retrying the failed operation may succeed.
    ///
    /// A failed creation leaves the key absent, so a later borrow retries it.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CreationFailed { .. })
    }

    /// The key associated with this error, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } => None,
            Self::CreationFailed { key, .. }
            | Self::TeardownFailed { key, .. }
            | Self::UseAfterRelease { key }
            | Self::Internal { key, .. } => Some(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_errors_become_creation_failed() {
        let err = Error::internal("a", "boom").into_creation_failed("a");
        assert!(matches!(err, Error::CreationFailed { ref key, .. } if key == "a"));
        assert!(err.is_retryable());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn creation_failed_passes_through() {
        let err = Error::creation("x", "disk full").into_creation_failed("ignored");
        assert_eq!(err.key(), Some("x"));
        assert_eq!(err.to_string(), "Creation failed for 'x': disk full");
    }

    #[test]
    fn teardown_normalisation_keeps_source() {
        let io = std::io::Error::other("sync failed");
        let err = Error::teardown_with("log", io);
        let again = err.clone().into_teardown_failed("other");
        assert_eq!(again.key(), Some("log"));
        assert!(!again.is_retryable());
    }

    #[test]
    fn configuration_has_no_key() {
        assert_eq!(Error::configuration("bad").key(), None);
        assert_eq!(
            Error::UseAfterRelease { key: "k".into() }.to_string(),
            "Lease for 'k' used after release"
        );
    }
}
