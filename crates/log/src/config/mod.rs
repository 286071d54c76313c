//! Logger configuration

mod presets;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::{LogError, LogResult};
use crate::format::Format;

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Record format written to every sink
    pub format: Format,

    /// Echo every record through `tracing` as well as the file
    pub echo: bool,

    /// Write an `Open:`/`Close:` record when a file is opened or closed
    pub announce_lifecycle: bool,

    /// Name of the sink pool, used in diagnostics
    pub pool_name: String,

    /// `tracing` filter for [`telemetry::init_from`](crate::telemetry::init_from)
    /// (e.g., "info", "debug,keel_resource=trace")
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: Format::Simple,
            echo: true,
            announce_lifecycle: false,
            pool_name: "log-sinks".to_string(),
            filter: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Check that the configuration can be used.
    pub fn validate(&self) -> LogResult<()> {
        if self.pool_name.trim().is_empty() {
            return Err(LogError::Config("pool_name must not be empty".to_string()));
        }
        EnvFilter::try_new(&self.filter)
            .map_err(|e| LogError::Filter(format!("{}: {e}", self.filter)))?;
        Ok(())
    }

    /// Use `format` for records.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}
