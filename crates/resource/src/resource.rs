//! The create/teardown contract the pool drives.
//!
//! A [`Resource`] describes how to build the shared instance for a key and
//! how to dispose of it once nobody borrows it any more. The pool guarantees
//! `create` runs at most once per live entry and `teardown` exactly once.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use crate::error::Result;

/// Factory and teardown operations for keyed, shared instances.
pub trait Resource: Send + Sync + 'static {
    /// Identity that decides sharing: equal keys share one instance.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// The shared instance handed out through leases.
    ///
    /// Leases only ever see `&Self::Instance`, so instances that need
    /// mutation carry their own interior mutability.
    type Instance: Send + Sync + 'static;

    /// Private state produced by `create` and consumed by `teardown`.
    type Context: Send + 'static;

    /// Short identifier used in logs and events (e.g. "file-sink").
    fn id(&self) -> &str;

    /// Build the instance for `key`.
    ///
    /// Any error is reported to borrowers as
    /// [`Error::CreationFailed`](crate::Error::CreationFailed).
    fn create(
        &self,
        key: &Self::Key,
    ) -> impl Future<Output = Result<(Self::Instance, Self::Context)>> + Send;

    /// Dispose of an instance after its last lease was released.
    ///
    /// Any error is reported as
    /// [`Error::TeardownFailed`](crate::Error::TeardownFailed); the entry is
    /// removed regardless.
    fn teardown(
        &self,
        instance: Self::Instance,
        context: Self::Context,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            drop(instance);
            drop(context);
            Ok(())
        }
    }

    /// Render a key for logs, events, and errors.
    fn describe(key: &Self::Key) -> String {
        format!("{key:?}")
    }
}
