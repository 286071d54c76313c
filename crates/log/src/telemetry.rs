//! Process-wide `tracing` subscriber setup
//!
//! The pool and every sink report through `tracing`; this installs the
//! subscriber that prints those events (and echoed records) to stderr.

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;
use crate::error::{LogError, LogResult};
use crate::format::Format;

/// Environment variable consulted before `RUST_LOG`.
pub const FILTER_ENV: &str = "KEEL_LOG";

/// Filter from `KEEL_LOG`, then `RUST_LOG`, then `default`.
#[must_use]
pub fn filter_from_env(default: &str) -> String {
    std::env::var(FILTER_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default.to_string())
}

/// Install a compact stderr subscriber with `filter`.
///
/// # Errors
/// Returns error if the filter cannot be parsed or a global subscriber is
/// already installed.
pub fn init(filter: &str) -> LogResult<()> {
    install(filter, Format::Simple)
}

/// Install a subscriber following `config`: its filter, and JSON output
/// when the config writes JSON records.
///
/// # Errors
/// Returns error if the filter cannot be parsed or a global subscriber is
/// already installed.
pub fn init_from(config: &LogConfig) -> LogResult<()> {
    install(&config.filter, config.format)
}

fn install(filter: &str, format: Format) -> LogResult<()> {
    let filter_layer = parse_filter(filter)?;
    let writer = std::io::stderr;

    let result = match format {
        Format::Simple => Registry::default()
            .with(filter_layer)
            .with(fmt::layer().compact().with_writer(writer))
            .try_init(),
        Format::Json => Registry::default()
            .with(filter_layer)
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
    };
    result.map_err(|e| LogError::Config(format!("Failed to install subscriber: {e}")))
}

fn parse_filter(filter: &str) -> LogResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| LogError::Filter(format!("{filter}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_is_reported_before_install() {
        assert!(matches!(init("keel=[["), Err(LogError::Filter(_))));
    }

    #[test]
    fn second_install_fails() {
        // Either this call installs the subscriber or another test already did.
        let _ = init("warn");
        assert!(matches!(init("warn"), Err(LogError::Config(_))));
    }
}
