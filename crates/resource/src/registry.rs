//! Key to entry mapping with single-flight creation.
//!
//! The live map holds at most one slot per key: either an in-flight creation
//! or a `Ready` entry. Entries that crossed zero move to the closing set, so
//! a key whose entry is tearing down looks absent to new borrowers.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::sync::watch;

use crate::entry::{Detach, Entry, EntryId};
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::resource::Resource;

/// Outcome of one creation, shared with every waiter.
pub(crate) type Outcome<R> = Option<Result<Arc<Entry<R>>>>;

/// What a borrower sees when it looks a key up.
enum Slot<R: Resource> {
    Creating {
        id: EntryId,
        outcome: watch::Receiver<Outcome<R>>,
    },
    Ready(Arc<Entry<R>>),
}

/// Result of [`Registry::acquire`].
pub(crate) enum Acquire<R: Resource> {
    /// Attached to a `Ready` entry.
    Attached(Arc<Entry<R>>, Arc<R::Instance>),
    /// Another borrower is already creating this key.
    Wait(watch::Receiver<Outcome<R>>),
    /// The caller owns the creation and must publish through `sender`.
    Create {
        id: EntryId,
        sender: watch::Sender<Outcome<R>>,
        receiver: watch::Receiver<Outcome<R>>,
    },
}

/// Registry of live and closing entries.
pub(crate) struct Registry<R: Resource> {
    live: DashMap<R::Key, Slot<R>>,
    closing: DashMap<EntryId, Arc<Entry<R>>>,
}

impl<R: Resource> Registry<R> {
    pub(crate) fn new() -> Self {
        Self {
            live: DashMap::new(),
            closing: DashMap::new(),
        }
    }

    /// Look `key` up and attach, wait, or claim the creation.
    ///
    /// `next_id` is only called when the caller becomes the creator.
    pub(crate) fn acquire(&self, key: &R::Key, next_id: impl FnOnce() -> EntryId) -> Acquire<R> {
        match self.live.entry(key.clone()) {
            MapEntry::Occupied(mut occupied) => {
                match occupied.get() {
                    Slot::Creating { outcome, .. } => return Acquire::Wait(outcome.clone()),
                    Slot::Ready(entry) => {
                        if let Some(instance) = entry.try_attach() {
                            return Acquire::Attached(Arc::clone(entry), instance);
                        }
                    }
                }
                // A Ready slot whose entry refused the attach is stale.
                let (id, sender, receiver) = Self::claim(next_id);
                occupied.insert(Slot::Creating {
                    id,
                    outcome: receiver.clone(),
                });
                Acquire::Create {
                    id,
                    sender,
                    receiver,
                }
            }
            MapEntry::Vacant(vacant) => {
                let (id, sender, receiver) = Self::claim(next_id);
                vacant.insert(Slot::Creating {
                    id,
                    outcome: receiver.clone(),
                });
                Acquire::Create {
                    id,
                    sender,
                    receiver,
                }
            }
        }
    }

    fn claim(
        next_id: impl FnOnce() -> EntryId,
    ) -> (EntryId, watch::Sender<Outcome<R>>, watch::Receiver<Outcome<R>>) {
        let (sender, receiver) = watch::channel(None);
        (next_id(), sender, receiver)
    }

    /// Install a created entry, or clear the provisional slot after a failure.
    pub(crate) fn finish_creation(&self, key: &R::Key, id: EntryId, outcome: &Result<Arc<Entry<R>>>) {
        if let MapEntry::Occupied(mut occupied) = self.live.entry(key.clone()) {
            let owned = matches!(occupied.get(), Slot::Creating { id: current, .. } if *current == id);
            if !owned {
                return;
            }
            match outcome {
                Ok(entry) => {
                    occupied.insert(Slot::Ready(Arc::clone(entry)));
                }
                Err(_) => {
                    occupied.remove();
                }
            }
        }
    }

    /// Drop one borrow from `entry`.
    ///
    /// On the zero-crossing the entry leaves the live map and joins the
    /// closing set before the shard lock is released.
    pub(crate) fn release(&self, entry: &Arc<Entry<R>>) -> Detach {
        let slot = self.live.entry(entry.key().clone());
        let detach = entry.detach();
        if detach == Detach::Closing {
            if let MapEntry::Occupied(occupied) = slot {
                if matches!(occupied.get(), Slot::Ready(live) if Arc::ptr_eq(live, entry)) {
                    occupied.remove();
                }
            }
            self.closing.insert(entry.id(), Arc::clone(entry));
        }
        detach
    }

    /// Move `entry` into the closing set if it is still live with no borrows.
    pub(crate) fn close_if_idle(&self, entry: &Arc<Entry<R>>) -> bool {
        let MapEntry::Occupied(occupied) = self.live.entry(entry.key().clone()) else {
            return false;
        };
        let live = matches!(occupied.get(), Slot::Ready(current) if Arc::ptr_eq(current, entry));
        if !live || !entry.try_close_idle() {
            return false;
        }
        occupied.remove();
        self.closing.insert(entry.id(), Arc::clone(entry));
        true
    }

    /// Teardown of `id` completed (successfully or not).
    pub(crate) fn finish_teardown(&self, id: EntryId) {
        self.closing.remove(&id);
    }

    /// Move every `Ready` entry without borrows into the closing set.
    pub(crate) fn drain_idle(&self) -> Vec<Arc<Entry<R>>> {
        let mut drained = Vec::new();
        self.live.retain(|_, slot| match slot {
            Slot::Ready(entry) if entry.try_close_idle() => {
                drained.push(Arc::clone(entry));
                false
            }
            _ => true,
        });
        for entry in &drained {
            self.closing.insert(entry.id(), Arc::clone(entry));
        }
        drained
    }

    /// Lifecycle of `key` as seen by an observer.
    pub(crate) fn state(&self, key: &R::Key) -> Lifecycle {
        if let Some(slot) = self.live.get(key) {
            return match slot.value() {
                Slot::Creating { .. } => Lifecycle::Creating,
                Slot::Ready(entry) => entry.lifecycle(),
            };
        }
        if self.closing.iter().any(|entry| entry.value().key() == key) {
            return Lifecycle::Closing;
        }
        Lifecycle::Absent
    }

    /// Borrow count of the live entry for `key`.
    pub(crate) fn borrow_count(&self, key: &R::Key) -> Option<usize> {
        match self.live.get(key)?.value() {
            Slot::Creating { .. } => None,
            Slot::Ready(entry) => Some(entry.borrows()),
        }
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(_)))
            .count()
    }

    pub(crate) fn closing_count(&self) -> usize {
        self.closing.len()
    }
}
