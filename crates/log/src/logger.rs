//! Path-keyed logger over a pool of shared file sinks

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use keel_resource::{Lease, Pool, PoolConfig};

use crate::config::LogConfig;
use crate::error::LogResult;
use crate::listener::{LogEvent, Listeners};
use crate::sink::FileSink;

/// Hands out shared leases on log files.
///
/// Opening a path that is already open returns a lease on the same file
/// handle. The file is closed when its last lease is released.
#[derive(Debug, Clone)]
pub struct Logger {
    pool: Pool<FileSink>,
    listeners: Arc<Listeners>,
}

impl Logger {
    /// Create a logger from `config`.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid.
    pub fn new(config: LogConfig) -> LogResult<Self> {
        config.validate()?;
        let listeners = Arc::new(Listeners::new());
        let pool_config = PoolConfig::named(config.pool_name.clone());
        let sink = FileSink::with_listeners(config, Arc::clone(&listeners));
        Ok(Self {
            pool: Pool::new(sink, pool_config)?,
            listeners,
        })
    }

    /// Borrow the sink for `path`, opening the file if it is not open.
    ///
    /// # Errors
    /// Returns error if the file could not be opened.
    pub async fn open(&self, path: impl Into<PathBuf>) -> LogResult<Lease<FileSink>> {
        Ok(self.pool.borrow(path.into()).await?)
    }

    /// Borrow the sink for `path` for the duration of `f`.
    ///
    /// # Errors
    /// Returns error if the file could not be opened, or if this was the
    /// last lease and closing the file failed.
    pub async fn scoped<T, F>(&self, path: impl Into<PathBuf>, f: F) -> LogResult<T>
    where
        F: for<'a> FnOnce(&'a Lease<FileSink>) -> BoxFuture<'a, T>,
    {
        Ok(self.pool.scoped(path.into(), f).await?)
    }

    /// Register a listener for sink events.
    pub fn on(&self, callback: impl Fn(&LogEvent) + Send + Sync + 'static) {
        self.listeners.add(callback);
    }

    /// The underlying sink pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<FileSink> {
        &self.pool
    }

    /// The configuration sinks are opened with.
    #[must_use]
    pub fn config(&self) -> &LogConfig {
        self.pool.resource().config()
    }

    /// Close every open file that has no live lease.
    ///
    /// # Errors
    /// Returns the first close error.
    pub async fn shutdown(&self) -> LogResult<()> {
        Ok(self.pool.shutdown().await?)
    }
}
