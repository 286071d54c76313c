//! Sink lifecycle listeners
//!
//! Listeners are plain synchronous callbacks, invoked in registration order
//! on the task that produced the event.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::level::Level;

/// Something that happened to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// The file was opened for appending.
    Opened {
        /// File path
        path: PathBuf,
    },
    /// A record was appended.
    Logged {
        /// File path
        path: PathBuf,
        /// Record severity
        level: Level,
        /// Message text, before formatting
        message: String,
        /// Record timestamp
        timestamp: DateTime<Utc>,
    },
    /// The file was flushed, synced and closed.
    Closed {
        /// File path
        path: PathBuf,
        /// Records appended while open
        lines_written: u64,
    },
}

impl LogEvent {
    /// Path of the sink the event is about.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Opened { path } | Self::Logged { path, .. } | Self::Closed { path, .. } => path,
        }
    }
}

type Callback = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Ordered list of callbacks.
#[derive(Default)]
pub struct Listeners {
    callbacks: RwLock<Vec<Callback>>,
}

impl Listeners {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback`; it runs after every callback added before it.
    pub fn add(&self, callback: impl Fn(&LogEvent) + Send + Sync + 'static) {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Invoke every callback with `event`.
    pub fn emit(&self, event: &LogEvent) {
        // Snapshot so a callback may register further listeners.
        let callbacks = self.callbacks.read().clone();
        for callback in &callbacks {
            callback(event);
        }
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Whether no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}
