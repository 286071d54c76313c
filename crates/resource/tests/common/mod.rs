//! Common test utilities for keel-resource integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use keel_resource::{Error, Pool, PoolConfig, Resource, Result};
use parking_lot::Mutex;
use tokio::sync::watch;

/// A collaborator call observed by [`Tracked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Teardown(String),
}

/// Instance handed out by [`Tracked`].
#[derive(Debug)]
pub struct Handle {
    pub key: String,
    pub generation: usize,
}

/// Gate that holds a collaborator call suspended until opened.
pub struct Gate(watch::Sender<bool>);

impl Gate {
    pub fn open(&self) {
        self.0.send_replace(true);
    }
}

/// Resource that records every call and can be told to suspend or fail.
pub struct Tracked {
    creates: AtomicUsize,
    teardowns: AtomicUsize,
    calls: Mutex<Vec<Call>>,
    failing_keys: Mutex<HashSet<String>>,
    failing_teardown: AtomicBool,
    panicking_teardown: AtomicBool,
    create_gate: watch::Receiver<bool>,
    teardown_gate: watch::Receiver<bool>,
}

impl Tracked {
    /// Resource whose calls complete immediately.
    pub fn new() -> Self {
        let (_, create_gate) = watch::channel(true);
        let (_, teardown_gate) = watch::channel(true);
        Self::with_gates(create_gate, teardown_gate)
    }

    /// Resource whose `create` calls wait for the returned gate.
    pub fn gated_create() -> (Self, Gate) {
        let (open, create_gate) = watch::channel(false);
        let (_, teardown_gate) = watch::channel(true);
        (Self::with_gates(create_gate, teardown_gate), Gate(open))
    }

    /// Resource whose `teardown` calls wait for the returned gate.
    pub fn gated_teardown() -> (Self, Gate) {
        let (_, create_gate) = watch::channel(true);
        let (open, teardown_gate) = watch::channel(false);
        (Self::with_gates(create_gate, teardown_gate), Gate(open))
    }

    fn with_gates(create_gate: watch::Receiver<bool>, teardown_gate: watch::Receiver<bool>) -> Self {
        Self {
            creates: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            failing_keys: Mutex::new(HashSet::new()),
            failing_teardown: AtomicBool::new(false),
            panicking_teardown: AtomicBool::new(false),
            create_gate,
            teardown_gate,
        }
    }

    /// Make every `create` for `key` fail until [`Tracked::heal`] is called.
    pub fn fail_on(&self, key: &str) {
        self.failing_keys.lock().insert(key.to_string());
    }

    pub fn heal(&self, key: &str) {
        self.failing_keys.lock().remove(key);
    }

    pub fn fail_teardowns(&self) {
        self.failing_teardown.store(true, Ordering::SeqCst);
    }

    /// Make every `teardown` panic instead of returning.
    pub fn panic_teardowns(&self) {
        self.panicking_teardown.store(true, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub fn creates_for(&self, key: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Create(k) if k == key))
            .count()
    }

    pub fn teardowns_for(&self, key: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Teardown(k) if k == key))
            .count()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

impl Resource for Tracked {
    type Key = String;
    type Instance = Handle;
    type Context = String;

    fn id(&self) -> &str {
        "tracked"
    }

    async fn create(&self, key: &String) -> Result<(Handle, String)> {
        let generation = self.creates.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(Call::Create(key.clone()));

        let mut gate = self.create_gate.clone();
        let _ = gate.wait_for(|open| *open).await;

        if self.failing_keys.lock().contains(key) {
            return Err(Error::creation(key.as_str(), "configured to fail"));
        }
        Ok((
            Handle {
                key: key.clone(),
                generation,
            },
            key.clone(),
        ))
    }

    async fn teardown(&self, _instance: Handle, context: String) -> Result<()> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(Call::Teardown(context.clone()));

        let mut gate = self.teardown_gate.clone();
        let _ = gate.wait_for(|open| *open).await;

        if self.panicking_teardown.load(Ordering::SeqCst) {
            panic!("teardown of {context} panicked");
        }
        if self.failing_teardown.load(Ordering::SeqCst) {
            return Err(Error::teardown(context, "configured to fail"));
        }
        Ok(())
    }
}

pub fn pool(resource: Tracked) -> Pool<Tracked> {
    Pool::new(resource, PoolConfig::named("test")).expect("valid config")
}

pub fn key(name: &str) -> String {
    name.to_string()
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition should hold within 5s");
}
