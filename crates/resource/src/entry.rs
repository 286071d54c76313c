//! Shared, reference-counted state for one key.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::lifecycle::Lifecycle;
use crate::resource::Resource;

/// Identifier of one entry instance. A key that is torn down and created
/// again gets a new id.
pub type EntryId = u64;

/// Counter and state, always mutated together.
#[derive(Debug)]
struct EntryState {
    borrows: usize,
    lifecycle: Lifecycle,
}

impl EntryState {
    fn advance(&mut self, next: Lifecycle) {
        debug_assert!(
            self.lifecycle.can_transition_to(next),
            "illegal lifecycle transition {} -> {next}",
            self.lifecycle
        );
        self.lifecycle = next;
    }
}

/// Outcome of dropping one borrow from an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Detach {
    /// Other leases are still live.
    Remaining(usize),
    /// This release crossed zero; the entry is now `Closing`.
    Closing,
    /// The entry had no borrows left to drop.
    Underflow,
}

/// The created instance and its teardown context.
struct Payload<R: Resource> {
    instance: Arc<R::Instance>,
    context: R::Context,
}

/// One created resource, owned by the registry.
///
/// Lock order: registry shard, then `state`, then `payload`.
pub(crate) struct Entry<R: Resource> {
    id: EntryId,
    key: R::Key,
    label: String,
    created_at: Instant,
    state: Mutex<EntryState>,
    payload: Mutex<Option<Payload<R>>>,
}

impl<R: Resource> Entry<R> {
    /// Wrap a freshly created instance. The entry starts `Ready` with no borrows.
    pub(crate) fn new(
        id: EntryId,
        key: R::Key,
        label: String,
        instance: R::Instance,
        context: R::Context,
    ) -> Self {
        Self {
            id,
            key,
            label,
            created_at: Instant::now(),
            state: Mutex::new(EntryState {
                borrows: 0,
                lifecycle: Lifecycle::Ready,
            }),
            payload: Mutex::new(Some(Payload {
                instance: Arc::new(instance),
                context,
            })),
        }
    }

    pub(crate) fn id(&self) -> EntryId {
        self.id
    }

    pub(crate) fn key(&self) -> &R::Key {
        &self.key
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub(crate) fn borrows(&self) -> usize {
        self.state.lock().borrows
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    /// Add one borrow if the entry is `Ready`, returning a handle to the
    /// instance. Entries that are closing refuse new borrows.
    pub(crate) fn try_attach(&self) -> Option<Arc<R::Instance>> {
        let mut state = self.state.lock();
        if !state.lifecycle.can_borrow() {
            return None;
        }
        let instance = self
            .payload
            .lock()
            .as_ref()
            .map(|payload| Arc::clone(&payload.instance))?;
        state.borrows += 1;
        Some(instance)
    }

    /// Drop one borrow. The decrement and the `Ready -> Closing` transition
    /// happen under one lock, so exactly one caller sees the zero-crossing.
    pub(crate) fn detach(&self) -> Detach {
        let mut state = self.state.lock();
        if state.borrows == 0 {
            return Detach::Underflow;
        }
        state.borrows -= 1;
        if state.borrows > 0 {
            return Detach::Remaining(state.borrows);
        }
        state.advance(Lifecycle::Closing);
        Detach::Closing
    }

    /// Move a `Ready` entry with no borrows straight to `Closing`.
    pub(crate) fn try_close_idle(&self) -> bool {
        let mut state = self.state.lock();
        if state.lifecycle == Lifecycle::Ready && state.borrows == 0 {
            state.advance(Lifecycle::Closing);
            return true;
        }
        false
    }

    /// Take the instance and context out for teardown. Only the caller that
    /// observed the zero-crossing calls this.
    pub(crate) fn take_payload(&self) -> Option<(Arc<R::Instance>, R::Context)> {
        self.payload
            .lock()
            .take()
            .map(|payload| (payload.instance, payload.context))
    }

    /// Teardown finished; the entry no longer exists for its key.
    pub(crate) fn mark_absent(&self) {
        self.state.lock().advance(Lifecycle::Absent);
    }
}

impl<R: Resource> std::fmt::Debug for Entry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("key", &self.label)
            .field("borrows", &state.borrows)
            .field("lifecycle", &state.lifecycle)
            .finish()
    }
}
