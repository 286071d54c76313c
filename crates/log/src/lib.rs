//! # Keel Log
//!
//! Append-mode log files shared between every part of a program that
//! writes to the same path.
//!
//! A [`Logger`] opens each path once, no matter how many concurrent scopes
//! log to it, and closes the file when the last of them is done. Sharing
//! and lifetime are handled by `keel-resource`; this crate supplies the
//! file sink, record formats, and listeners.
//!
//! ```no_run
//! use keel_log::{LogConfig, Logger};
//!
//! # async fn run() -> keel_log::LogResult<()> {
//! let logger = Logger::new(LogConfig::development())?;
//! let mut log = logger.open("app.log").await?;
//! log.info("Application started").await?;
//! log.release().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod level;
pub mod listener;
pub mod logger;
pub mod sink;
pub mod telemetry;

pub use config::LogConfig;
pub use error::{LogError, LogResult};
pub use format::{Format, Record};
pub use level::Level;
pub use listener::{Listeners, LogEvent};
pub use logger::Logger;
pub use sink::{FileSink, SinkContext, SinkHandle};
