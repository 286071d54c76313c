//! # Keel Resource
//!
//! Keyed, reference-counted lifecycle management for shared resources.
//!
//! A [`Pool`] creates at most one instance per key, shares it between every
//! concurrent [`Lease`], and tears it down exactly once, when the last lease
//! is released. What an instance is and how it is built or disposed of is
//! supplied through the [`Resource`] trait.
//!
//! ```no_run
//! use keel_resource::{Pool, PoolConfig, Resource, Result};
//!
//! struct Greeting;
//!
//! impl Resource for Greeting {
//!     type Key = String;
//!     type Instance = String;
//!     type Context = ();
//!
//!     fn id(&self) -> &str {
//!         "greeting"
//!     }
//!
//!     async fn create(&self, key: &String) -> Result<(String, ())> {
//!         Ok((format!("hello, {key}"), ()))
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let pool = Pool::new(Greeting, PoolConfig::default())?;
//! let mut lease = pool.borrow("world".to_string()).await?;
//! assert_eq!(lease.get()?, "hello, world");
//! lease.release().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod entry;
pub mod error;
pub mod events;
pub mod lease;
pub mod lifecycle;
pub mod pool;
mod registry;
pub mod resource;

pub use config::PoolConfig;
pub use entry::EntryId;
pub use error::{Error, Result};
pub use events::{EventBus, PoolEvent};
pub use lease::Lease;
pub use lifecycle::Lifecycle;
pub use pool::{Pool, PoolStats};
pub use resource::Resource;
