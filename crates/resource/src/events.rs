//! Event broadcasting for entry lifecycle observability.
//!
//! Provides [`PoolEvent`] variants emitted as entries are created, borrowed,
//! released and torn down, and an [`EventBus`] backed by
//! `tokio::sync::broadcast`. Teardown failures that have no caller to report
//! to (drop-triggered releases, shutdown) surface here.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::entry::EntryId;

// ---------------------------------------------------------------------------
// PoolEvent
// ---------------------------------------------------------------------------

/// Events emitted by a [`Pool`](crate::Pool).
///
/// All variants carry the rendered `key` of the entry involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// `create` succeeded and the entry is `Ready`.
    Created {
        /// The key.
        key: String,
        /// The new entry.
        entry_id: EntryId,
    },
    /// `create` failed; the key is absent again.
    CreationFailed {
        /// The key.
        key: String,
        /// Human-readable error description.
        error: String,
    },
    /// A lease was handed out.
    Borrowed {
        /// The key.
        key: String,
        /// The entry the lease is bound to.
        entry_id: EntryId,
    },
    /// A lease was released and other leases remain.
    Released {
        /// The key.
        key: String,
        /// Leases still live on the entry.
        remaining: usize,
        /// How long the released lease was held.
        held: Duration,
    },
    /// The last lease was released; teardown is starting.
    Closing {
        /// The key.
        key: String,
        /// The entry being torn down.
        entry_id: EntryId,
    },
    /// Teardown finished and the entry was removed.
    TornDown {
        /// The key.
        key: String,
        /// The removed entry.
        entry_id: EntryId,
        /// Time between creation and removal.
        lifetime: Duration,
    },
    /// Teardown failed; the entry was removed regardless.
    TeardownFailed {
        /// The key.
        key: String,
        /// Human-readable error description.
        error: String,
    },
}

impl PoolEvent {
    /// The rendered key this event is about.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Created { key, .. }
            | Self::CreationFailed { key, .. }
            | Self::Borrowed { key, .. }
            | Self::Released { key, .. }
            | Self::Closing { key, .. }
            | Self::TornDown { key, .. }
            | Self::TeardownFailed { key, .. } => key,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast-based event bus for pool lifecycle events.
///
/// Emission is fire-and-forget: if no subscribers are listening or the
/// channel is full, events are dropped (no backpressure on the emitter).
pub struct EventBus {
    sender: broadcast::Sender<PoolEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer size.
    ///
    /// # Panics
    /// Panics if `buffer_size` is zero; [`PoolConfig::validate`](crate::PoolConfig::validate)
    /// rejects that before a pool builds its bus.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: PoolEvent) {
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}
