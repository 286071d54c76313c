//! Pool configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a [`Pool`](crate::Pool)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Name attached to every log line and span emitted by the pool
    pub name: String,
    /// Capacity of the lifecycle event channel
    pub event_buffer: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            event_buffer: 1024,
        }
    }
}

impl PoolConfig {
    /// Configuration with the given pool name and default settings.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("name must not be empty"));
        }
        if self.event_buffer == 0 {
            return Err(Error::configuration(
                "event_buffer must be greater than 0",
            ));
        }
        Ok(())
    }
}
