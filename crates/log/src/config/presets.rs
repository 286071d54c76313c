//! Configuration presets for common scenarios

use super::LogConfig;
use crate::format::Format;

impl LogConfig {
    /// Create configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Parse KEEL_LOG or RUST_LOG
        if let Ok(filter) = std::env::var("KEEL_LOG") {
            config.filter = filter;
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            config.filter = filter;
        }

        // Parse format
        if let Ok(format) = std::env::var("KEEL_LOG_FORMAT") {
            config.format = parse_format(&format, config.format);
        }

        if let Ok(echo) = std::env::var("KEEL_LOG_ECHO") {
            config.echo = parse_flag(&echo).unwrap_or(config.echo);
        }

        config
    }

    /// Development configuration (simple lines, echoed, lifecycle records)
    #[must_use]
    pub fn development() -> Self {
        Self {
            format: Format::Simple,
            echo: true,
            announce_lifecycle: true,
            filter: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Production configuration (JSON lines, no echo)
    #[must_use]
    pub fn production() -> Self {
        Self {
            format: Format::Json,
            echo: false,
            announce_lifecycle: false,
            filter: "info".to_string(),
            ..Self::default()
        }
    }

    /// Quiet configuration: files only, nothing echoed
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            echo: false,
            filter: "warn".to_string(),
            ..Self::default()
        }
    }
}

/// Parse `KEEL_LOG_FORMAT`, keeping `fallback` for unknown values.
fn parse_format(value: &str, fallback: Format) -> Format {
    value.parse().unwrap_or_else(|err| {
        tracing::warn!(value, error = %err, fallback = ?fallback, "ignoring KEEL_LOG_FORMAT");
        fallback
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
