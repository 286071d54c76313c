//! Append-mode file sinks
//!
//! [`FileSink`] is the [`Resource`] that opens one file per path. Every
//! lease on the same path shares one [`SinkHandle`]; the file is flushed,
//! synced and closed when the last lease is released.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use keel_resource::{Error, Resource, Result};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::LogConfig;
use crate::error::{LogError, LogResult};
use crate::format::{self, Format, Record};
use crate::level::Level;
use crate::listener::{LogEvent, Listeners};

/// Opens and closes append-mode log files keyed by path.
#[derive(Debug)]
pub struct FileSink {
    config: LogConfig,
    listeners: Arc<Listeners>,
}

impl FileSink {
    /// Sink with its own, initially empty, listener list.
    #[must_use]
    pub fn new(config: LogConfig) -> Self {
        Self::with_listeners(config, Arc::new(Listeners::new()))
    }

    /// Sink notifying `listeners`.
    #[must_use]
    pub fn with_listeners(config: LogConfig, listeners: Arc<Listeners>) -> Self {
        Self { config, listeners }
    }

    /// The configuration new handles are created with.
    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Listeners notified by every handle of this sink.
    #[must_use]
    pub fn listeners(&self) -> &Arc<Listeners> {
        &self.listeners
    }

    async fn open(&self, path: &Path) -> LogResult<SinkHandle> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await
            .map_err(|source| LogError::io(path, source))?;

        tracing::info!(path = %path.display(), format = %self.config.format, "log file opened");
        let handle = SinkHandle {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            format: self.config.format,
            echo: self.config.echo,
            lines: AtomicU64::new(0),
            listeners: Arc::clone(&self.listeners),
        };
        self.listeners.emit(&LogEvent::Opened {
            path: handle.path.clone(),
        });
        if self.config.announce_lifecycle {
            handle.info(&format!("Open: {}", path.display())).await?;
        }
        Ok(handle)
    }
}

/// State kept alongside an open handle until it is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkContext {
    /// When the file was opened
    pub opened_at: DateTime<Utc>,
    /// Whether a `Close:` record is written on close
    pub announce_close: bool,
}

impl Resource for FileSink {
    type Key = PathBuf;
    type Instance = SinkHandle;
    type Context = SinkContext;

    fn id(&self) -> &str {
        "file-sink"
    }

    async fn create(&self, path: &PathBuf) -> Result<(SinkHandle, SinkContext)> {
        let handle = self
            .open(path)
            .await
            .map_err(|err| Error::creation_with(path.display().to_string(), err))?;
        let context = SinkContext {
            opened_at: Utc::now(),
            announce_close: self.config.announce_lifecycle,
        };
        Ok((handle, context))
    }

    async fn teardown(&self, handle: SinkHandle, context: SinkContext) -> Result<()> {
        let label = handle.path.display().to_string();
        let lines = handle
            .close(context.announce_close)
            .await
            .map_err(|err| Error::teardown_with(label.as_str(), err))?;
        let open_for = Utc::now() - context.opened_at;
        tracing::info!(path = %label, lines, open_ms = open_for.num_milliseconds(), "log file closed");
        Ok(())
    }

    fn describe(path: &PathBuf) -> String {
        path.display().to_string()
    }
}

/// A shared, open log file.
///
/// Writes from concurrent leases are serialized; each record is appended as
/// one complete line.
pub struct SinkHandle {
    path: PathBuf,
    file: Mutex<File>,
    format: Format,
    echo: bool,
    lines: AtomicU64,
    listeners: Arc<Listeners>,
}

impl SinkHandle {
    /// Append one record at `level`.
    pub async fn log(&self, level: Level, message: &str) -> LogResult<()> {
        let record = Record::now(level, message);
        let mut line = format::render(self.format, &record)?;
        line.push('\n');

        {
            let mut file = self.file.lock().await;
            file.write_all(line.as_bytes())
                .await
                .map_err(|source| LogError::io(&self.path, source))?;
            file.flush()
                .await
                .map_err(|source| LogError::io(&self.path, source))?;
        }
        self.lines.fetch_add(1, Ordering::Relaxed);

        if self.echo {
            echo(level, &self.path, line.trim_end());
        }
        self.listeners.emit(&LogEvent::Logged {
            path: self.path.clone(),
            level,
            message: message.to_string(),
            timestamp: record.timestamp,
        });
        Ok(())
    }

    /// Append an `INFO` record.
    pub async fn info(&self, message: &str) -> LogResult<()> {
        self.log(Level::Info, message).await
    }

    /// Append a `WARN` record.
    pub async fn warn(&self, message: &str) -> LogResult<()> {
        self.log(Level::Warn, message).await
    }

    /// Append an `ERROR` record.
    pub async fn error(&self, message: &str) -> LogResult<()> {
        self.log(Level::Error, message).await
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle so far.
    #[must_use]
    pub fn lines_written(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    /// Flush, sync and close the file. Returns the number of records written.
    async fn close(self, announce: bool) -> LogResult<u64> {
        if announce {
            self.info(&format!("Close: {}", self.path.display())).await?;
        }
        let lines = self.lines_written();
        let Self {
            path,
            file,
            listeners,
            ..
        } = self;

        let mut file = file.into_inner();
        file.flush()
            .await
            .map_err(|source| LogError::io(&path, source))?;
        file.sync_all()
            .await
            .map_err(|source| LogError::io(&path, source))?;
        drop(file);

        listeners.emit(&LogEvent::Closed {
            path,
            lines_written: lines,
        });
        Ok(lines)
    }
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("lines_written", &self.lines_written())
            .finish_non_exhaustive()
    }
}

fn echo(level: Level, path: &Path, line: &str) {
    let path = path.display();
    match level {
        Level::Trace => tracing::trace!(target: "keel_log::sink", %path, "{line}"),
        Level::Debug => tracing::debug!(target: "keel_log::sink", %path, "{line}"),
        Level::Info => tracing::info!(target: "keel_log::sink", %path, "{line}"),
        Level::Warn => tracing::warn!(target: "keel_log::sink", %path, "{line}"),
        Level::Error => tracing::error!(target: "keel_log::sink", %path, "{line}"),
    }
}
