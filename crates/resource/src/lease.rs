//! Borrow leases: the caller-facing handle for one unit of an entry's
//! borrow count.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::entry::{Entry, EntryId};
use crate::error::{Error, Result};
use crate::pool::PoolInner;
use crate::resource::Resource;

/// A single borrow of a pooled instance.
///
/// Access the instance with [`get`](Self::get) (or `Deref`). Call
/// [`release`](Self::release) when done; releasing twice is a no-op. A lease
/// that is dropped without being released is released on the current tokio
/// runtime in the background. Dropped outside any runtime, the release and
/// any teardown it triggers run synchronously on a temporary runtime.
pub struct Lease<R: Resource> {
    pool: Arc<PoolInner<R>>,
    entry: Arc<Entry<R>>,
    instance: Option<Arc<R::Instance>>,
    released: bool,
    acquired_at: Instant,
}

impl<R: Resource> Lease<R> {
    pub(crate) fn new(pool: Arc<PoolInner<R>>, entry: Arc<Entry<R>>, instance: Arc<R::Instance>) -> Self {
        Self {
            pool,
            entry,
            instance: Some(instance),
            released: false,
            acquired_at: Instant::now(),
        }
    }

    /// The shared instance.
    ///
    /// # Errors
    /// Returns [`Error::UseAfterRelease`] once this lease was released.
    pub fn get(&self) -> Result<&R::Instance> {
        self.instance.as_deref().ok_or_else(|| Error::UseAfterRelease {
            key: self.entry.label().to_string(),
        })
    }

    /// The key this lease was borrowed for.
    #[must_use]
    pub fn key(&self) -> &R::Key {
        self.entry.key()
    }

    /// Identifier of the entry this lease counts against.
    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        self.entry.id()
    }

    /// Whether [`release`](Self::release) has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// How long the lease has been held.
    #[must_use]
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Give the borrow back.
    ///
    /// If this was the last live lease on the entry, the entry's teardown
    /// runs before this returns. Calling `release` again does nothing.
    ///
    /// # Errors
    /// Returns [`Error::TeardownFailed`] if this release triggered a teardown
    /// that failed. The entry is removed either way.
    pub async fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        // Our instance handle must be gone before the count can reach zero.
        self.instance = None;
        self.pool
            .release(Arc::clone(&self.entry), self.acquired_at.elapsed())
            .await
    }
}

impl<R: Resource> std::ops::Deref for Lease<R> {
    type Target = R::Instance;

    /// # Panics
    /// Panics if the lease was released; use [`Lease::get`] to handle that
    /// case without panicking.
    fn deref(&self) -> &R::Instance {
        match self.instance.as_deref() {
            Some(instance) => instance,
            None => panic!("lease for {} used after release", self.entry.label()),
        }
    }
}

impl<R: Resource> Drop for Lease<R> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.instance = None;

        let pool = Arc::clone(&self.pool);
        let entry = Arc::clone(&self.entry);
        let held = self.acquired_at.elapsed();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn(async move {
                    // No caller to report to; failures surface as events.
                    let _ = pool.release(entry, held).await;
                }));
            }
            Err(_) => pool.release_detached(&entry, held),
        }
    }
}

impl<R: Resource> std::fmt::Debug for Lease<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("key", &self.entry.label())
            .field("entry_id", &self.entry.id())
            .field("released", &self.released)
            .finish()
    }
}
