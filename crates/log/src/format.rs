//! Record formats
//!
//! One record becomes one line. [`Format::Simple`] produces
//! `[<timestamp>] [<LEVEL>] <message>`, [`Format::Json`] produces an object
//! with `timestamp`, `level` and `message` fields in that order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};
use crate::level::Level;

/// Output format of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Bracketed timestamp and level followed by the message
    #[default]
    Simple,
    /// One JSON object per line
    Json,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for Format {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "json" => Ok(Self::Json),
            other => Err(LogError::Config(format!("unknown format '{other}'"))),
        }
    }
}

/// A single record before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    /// When the record was produced
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: Level,
    /// Message text
    pub message: &'a str,
}

impl<'a> Record<'a> {
    /// Record stamped with the current time.
    #[must_use]
    pub fn now(level: Level, message: &'a str) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message,
        }
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: &'a str,
    level: Level,
    message: &'a str,
}

/// RFC 3339 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
#[must_use]
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render `record` as a single line, without the trailing newline.
pub fn render(format: Format, record: &Record<'_>) -> LogResult<String> {
    let stamp = timestamp(&record.timestamp);
    match format {
        Format::Simple => Ok(format!("[{stamp}] [{}] {}", record.level, record.message)),
        Format::Json => Ok(serde_json::to_string(&JsonLine {
            timestamp: &stamp,
            level: record.level,
            message: record.message,
        })?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn record(message: &str) -> Record<'_> {
        Record {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap(),
            level: Level::Error,
            message,
        }
    }

    #[test]
    fn simple_line() {
        let line = render(Format::Simple, &record("Something went wrong")).unwrap();
        assert_eq!(line, "[2024-05-01T12:30:05.000Z] [ERROR] Something went wrong");
    }

    #[test]
    fn json_line_keeps_field_order() {
        let line = render(Format::Json, &record("Application started")).unwrap();
        assert_eq!(
            line,
            r#"{"timestamp":"2024-05-01T12:30:05.000Z","level":"ERROR","message":"Application started"}"#
        );
    }

    #[test]
    fn json_escapes_message() {
        let line = render(Format::Json, &record("quote \" and\nnewline")).unwrap();
        assert!(!line.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["message"], "quote \" and\nnewline");
    }

    #[test]
    fn format_names_round_trip() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!(Format::Simple.to_string(), "simple");
        assert!("xml".parse::<Format>().is_err());
    }
}
