//! Keyed, reference-counted resource pool.
//!
//! `Pool<R>` hands out [`Lease`]s for keys. The first borrow of an absent key
//! drives a single `R::create`; later borrows share that instance. The
//! release that brings an entry's borrow count to zero runs `R::teardown`
//! and removes the entry, after which the key can be created again.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::config::PoolConfig;
use crate::entry::{Detach, Entry, EntryId};
use crate::error::{Error, Result};
use crate::events::{EventBus, PoolEvent};
use crate::lease::Lease;
use crate::lifecycle::Lifecycle;
use crate::registry::{Acquire, Registry};
use crate::resource::Resource;

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful `create` calls.
    pub created: u64,
    /// Failed `create` calls.
    pub creation_failures: u64,
    /// Completed teardowns, successful or not.
    pub torn_down: u64,
    /// Teardowns that returned an error.
    pub teardown_failures: u64,
    /// Leases handed out.
    pub borrows: u64,
    /// Leases released.
    pub releases: u64,
    /// Entries currently `Ready`.
    pub live_entries: usize,
    /// Entries currently `Closing`.
    pub closing_entries: usize,
}

/// Shared state behind every clone of a pool and every lease.
pub(crate) struct PoolInner<R: Resource> {
    resource: R,
    config: PoolConfig,
    registry: Registry<R>,
    events: EventBus,
    stats: Mutex<PoolStats>,
    next_id: AtomicU64,
}

impl<R: Resource> PoolInner<R> {
    fn next_id(&self) -> EntryId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Start the single creation for `key` on the runtime.
    ///
    /// Creation runs in its own task so that a borrower giving up does not
    /// leave the key stuck in `Creating`.
    fn spawn_create(
        self: &Arc<Self>,
        key: R::Key,
        id: EntryId,
        sender: tokio::sync::watch::Sender<crate::registry::Outcome<R>>,
    ) {
        let inner = Arc::clone(self);
        drop(tokio::spawn(async move {
            let label = R::describe(&key);
            let mut pending = PendingCreation {
                inner: &inner,
                key: &key,
                id,
                armed: true,
            };

            tracing::debug!(pool = %inner.config.name, key = %label, entry_id = id, "creating entry");
            let outcome = match inner.resource.create(&key).await {
                Ok((instance, context)) => Ok(Arc::new(Entry::new(
                    id,
                    key.clone(),
                    label.clone(),
                    instance,
                    context,
                ))),
                Err(err) => Err(err.into_creation_failed(&label)),
            };

            inner.registry.finish_creation(&key, id, &outcome);
            pending.armed = false;

            match &outcome {
                Ok(_) => {
                    inner.stats.lock().created += 1;
                    tracing::info!(pool = %inner.config.name, key = %label, entry_id = id, "entry created");
                    inner.events.emit(PoolEvent::Created {
                        key: label,
                        entry_id: id,
                    });
                }
                Err(err) => {
                    inner.stats.lock().creation_failures += 1;
                    tracing::warn!(pool = %inner.config.name, key = %label, error = %err, "entry creation failed");
                    inner.events.emit(PoolEvent::CreationFailed {
                        key: label,
                        error: err.to_string(),
                    });
                }
            }

            let created = outcome.as_ref().ok().map(Arc::clone);
            sender.send_replace(Some(outcome));

            // Every waiter either attached or gave up once the receivers are gone.
            if let Some(entry) = created {
                sender.closed().await;
                if inner.registry.close_if_idle(&entry) {
                    tracing::debug!(
                        pool = %inner.config.name,
                        key = %entry.label(),
                        entry_id = entry.id(),
                        "no borrower attached to new entry"
                    );
                    // Failures are reported through events.
                    let _ = inner.teardown(entry).await;
                }
            }
        }));
    }

    /// Drop one borrow of `entry`; on the zero-crossing, tear it down.
    pub(crate) async fn release(self: &Arc<Self>, entry: Arc<Entry<R>>, held: Duration) -> Result<()> {
        let detach = self.registry.release(&entry);
        match detach {
            Detach::Underflow => Err(Error::internal(
                entry.label(),
                "release without a matching borrow",
            )),
            Detach::Remaining(remaining) => {
                self.stats.lock().releases += 1;
                tracing::debug!(pool = %self.config.name, key = %entry.label(), remaining, "lease released");
                self.events.emit(PoolEvent::Released {
                    key: entry.label().to_string(),
                    remaining,
                    held,
                });
                Ok(())
            }
            Detach::Closing => {
                self.stats.lock().releases += 1;
                self.events.emit(PoolEvent::Released {
                    key: entry.label().to_string(),
                    remaining: 0,
                    held,
                });
                // Teardown runs to completion even if this caller goes away.
                let inner = Arc::clone(self);
                let label = entry.label().to_string();
                tokio::spawn(async move { inner.teardown(entry).await })
                    .await
                    .map_err(|_| Error::internal(label, "teardown task panicked"))?
            }
        }
    }

    /// Release bookkeeping for a lease dropped outside any runtime.
    ///
    /// On the zero-crossing, teardown runs to completion on a temporary
    /// current-thread runtime. If that runtime cannot be built, the instance
    /// is dropped without `R::teardown` and `TeardownFailed` is emitted.
    pub(crate) fn release_detached(&self, entry: &Arc<Entry<R>>, held: Duration) {
        let detach = self.registry.release(entry);
        if detach == Detach::Underflow {
            return;
        }
        self.stats.lock().releases += 1;
        if detach != Detach::Closing {
            return;
        }
        self.events.emit(PoolEvent::Released {
            key: entry.label().to_string(),
            remaining: 0,
            held,
        });

        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => {
                // Failures are reported through events.
                let _ = runtime.block_on(self.teardown(Arc::clone(entry)));
            }
            Err(err) => {
                tracing::warn!(
                    pool = %self.config.name,
                    key = %entry.label(),
                    error = %err,
                    "no runtime for teardown; dropping instance"
                );
                drop(entry.take_payload());
                {
                    let mut stats = self.stats.lock();
                    stats.torn_down += 1;
                    stats.teardown_failures += 1;
                }
                entry.mark_absent();
                self.registry.finish_teardown(entry.id());
                self.events.emit(PoolEvent::TeardownFailed {
                    key: entry.label().to_string(),
                    error: format!("no runtime for teardown: {err}"),
                });
            }
        }
    }

    /// Run `R::teardown` for an entry that is `Closing`, then remove it.
    async fn teardown(&self, entry: Arc<Entry<R>>) -> Result<()> {
        let label = entry.label().to_string();
        tracing::debug!(pool = %self.config.name, key = %label, entry_id = entry.id(), "tearing down entry");
        self.events.emit(PoolEvent::Closing {
            key: label.clone(),
            entry_id: entry.id(),
        });

        let result = match entry.take_payload() {
            Some((instance, context)) => match Arc::try_unwrap(instance) {
                Ok(instance) => {
                    match AssertUnwindSafe(self.resource.teardown(instance, context))
                        .catch_unwind()
                        .await
                    {
                        Ok(result) => result.map_err(|err| err.into_teardown_failed(&label)),
                        Err(_) => Err(Error::teardown(&label, "teardown panicked")),
                    }
                }
                Err(_) => Err(Error::internal(&label, "instance still shared at teardown")),
            },
            None => Err(Error::internal(&label, "entry was already torn down")),
        };

        {
            let mut stats = self.stats.lock();
            stats.torn_down += 1;
            if result.is_err() {
                stats.teardown_failures += 1;
            }
        }

        entry.mark_absent();
        self.registry.finish_teardown(entry.id());

        match &result {
            Ok(()) => {
                tracing::info!(pool = %self.config.name, key = %label, entry_id = entry.id(), "entry torn down");
                self.events.emit(PoolEvent::TornDown {
                    key: label,
                    entry_id: entry.id(),
                    lifetime: entry.age(),
                });
            }
            Err(err) => {
                tracing::warn!(pool = %self.config.name, key = %label, error = %err, "entry teardown failed");
                self.events.emit(PoolEvent::TeardownFailed {
                    key: label,
                    error: err.to_string(),
                });
            }
        }

        result
    }
}

/// Clears the `Creating` slot if the creation task ends without publishing.
struct PendingCreation<'a, R: Resource> {
    inner: &'a PoolInner<R>,
    key: &'a R::Key,
    id: EntryId,
    armed: bool,
}

impl<R: Resource> Drop for PendingCreation<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            let aborted = Err(Error::internal(
                R::describe(self.key),
                "creation task ended without an outcome",
            ));
            self.inner.registry.finish_creation(self.key, self.id, &aborted);
        }
    }
}

/// Keyed, reference-counted pool of shared instances.
pub struct Pool<R: Resource> {
    inner: Arc<PoolInner<R>>,
}

impl<R: Resource> Clone for Pool<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resource> std::fmt::Debug for Pool<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.config.name)
            .field("resource_id", &self.inner.resource.id())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<R: Resource> Pool<R> {
    /// Create a pool for `resource`.
    ///
    /// # Errors
    /// Returns error if `config` is invalid.
    pub fn new(resource: R, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                resource,
                events: EventBus::new(config.event_buffer),
                config,
                registry: Registry::new(),
                stats: Mutex::new(PoolStats::default()),
                next_id: AtomicU64::new(0),
            }),
        })
    }

    /// The resource driving this pool.
    #[must_use]
    pub fn resource(&self) -> &R {
        &self.inner.resource
    }

    /// Borrow the shared instance for `key`, creating it if absent.
    ///
    /// Concurrent borrows of an absent key share one `create` call and its
    /// outcome. A key whose entry is tearing down is created afresh.
    pub async fn borrow(&self, key: R::Key) -> Result<Lease<R>> {
        loop {
            let mut outcome = match self.inner.registry.acquire(&key, || self.inner.next_id()) {
                Acquire::Attached(entry, instance) => return Ok(self.lease(entry, instance)),
                Acquire::Wait(receiver) => receiver,
                Acquire::Create {
                    id,
                    sender,
                    receiver,
                } => {
                    self.inner.spawn_create(key.clone(), id, sender);
                    receiver
                }
            };

            let published = match outcome.wait_for(Option::is_some).await {
                Ok(value) => (*value).clone(),
                Err(_) => None,
            };

            match published {
                Some(Ok(entry)) => {
                    if let Some(instance) = entry.try_attach() {
                        return Ok(self.lease(entry, instance));
                    }
                    // Released to zero before we attached; start over.
                    tracing::trace!(pool = %self.inner.config.name, key = %entry.label(), "entry closed before attach, retrying");
                }
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(Error::internal(
                        R::describe(&key),
                        "creation task ended without an outcome",
                    ));
                }
            }
        }
    }

    fn lease(&self, entry: Arc<Entry<R>>, instance: Arc<R::Instance>) -> Lease<R> {
        self.inner.stats.lock().borrows += 1;
        tracing::debug!(pool = %self.inner.config.name, key = %entry.label(), borrows = entry.borrows(), "lease borrowed");
        self.inner.events.emit(PoolEvent::Borrowed {
            key: entry.label().to_string(),
            entry_id: entry.id(),
        });
        Lease::new(Arc::clone(&self.inner), entry, instance)
    }

    /// Borrow `key` for the duration of `f`.
    ///
    /// The lease is released when `f`'s future completes. If the future
    /// panics or is dropped, the lease's `Drop` releases it instead.
    ///
    /// # Errors
    /// Returns the borrow error, or the teardown error if this release was
    /// the last one and teardown failed.
    pub async fn scoped<T, F>(&self, key: R::Key, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a Lease<R>) -> BoxFuture<'a, T>,
    {
        let mut lease = self.borrow(key).await?;
        let output = f(&lease).await;
        lease.release().await?;
        Ok(output)
    }

    /// Lifecycle state of `key`.
    #[must_use]
    pub fn state(&self, key: &R::Key) -> Lifecycle {
        self.inner.registry.state(key)
    }

    /// Live borrows on the `Ready` entry for `key`, if there is one.
    #[must_use]
    pub fn borrow_count(&self, key: &R::Key) -> Option<usize> {
        self.inner.registry.borrow_count(key)
    }

    /// Number of entries whose teardown is in progress.
    #[must_use]
    pub fn closing_count(&self) -> usize {
        self.inner.registry.closing_count()
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let mut stats = self.inner.stats.lock().clone();
        stats.live_entries = self.inner.registry.live_count();
        stats.closing_entries = self.inner.registry.closing_count();
        stats
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.inner.events.subscribe()
    }

    /// Tear down every `Ready` entry that has no borrows.
    ///
    /// Such entries exist only between a creation whose every waiter gave up
    /// and the creation task closing it, or when the runtime stopped in
    /// between. Entries with live leases are left to their owners. Returns
    /// the first teardown error, after attempting all.
    pub async fn shutdown(&self) -> Result<()> {
        let drained = self.inner.registry.drain_idle();
        tracing::info!(pool = %self.inner.config.name, entries = drained.len(), "shutting down idle entries");
        let mut first_error = None;
        for entry in drained {
            if let Err(err) = self.inner.teardown(entry).await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
