//! Common test utilities for integration tests.

#![allow(dead_code)]

use kiln_core::prelude::*;
use kiln_executor::{Context, ContextConfig, Graph};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Point in an operator's `apply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    End,
}

/// One journal line.
#[derive(Debug, Clone)]
pub struct Entry {
    pub seq: usize,
    pub name: String,
    pub phase: Phase,
    pub requisites_updated: Freshness,
}

/// Totally ordered record of operator starts and ends across workers.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Mutex<Vec<Entry>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, name: &str, phase: Phase, requisites_updated: Freshness) {
        // Sequence numbers are assigned under the lock so they match insertion order.
        let mut entries = self.entries.lock();
        let seq = entries.len();
        entries.push(Entry {
            seq,
            name: name.to_string(),
            phase,
            requisites_updated,
        });
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().clone()
    }

    /// How many times `name` started applying.
    pub fn applied(&self, name: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.name == name && e.phase == Phase::Start)
            .count()
    }

    /// Sequence number of the first `phase` entry for `name`.
    pub fn seq(&self, name: &str, phase: Phase) -> Option<usize> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.name == name && e.phase == phase)
            .map(|e| e.seq)
    }

    /// Requisite high-water mark `name` observed when it started.
    pub fn observed(&self, name: &str) -> Option<Freshness> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.name == name && e.phase == Phase::Start)
            .map(|e| e.requisites_updated)
    }

    /// Names in start order.
    pub fn start_order(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.phase == Phase::Start)
            .map(|e| e.name.clone())
            .collect()
    }

    /// Largest number of operators observed applying at once.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

/// What a [`TestOp`] does when applied.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Report products updated now.
    Update,
    /// Report products updated at a fixed freshness.
    UpdateAt(Freshness),
    /// Report no work needed.
    Skip,
    /// Fail with an operator error.
    Fail(String),
    /// Panic with a message.
    Panic(String),
    /// Poll for cancellation until the run is aborted or the timeout passes.
    WaitForAbort(Duration),
    /// Empty the first product slot, then report an update.
    DropProduct,
}

/// Configurable operator that journals its applications.
pub struct TestOp {
    id: EntityId,
    name: String,
    requisites: usize,
    products: usize,
    behavior: Behavior,
    delay: Duration,
    journal: Arc<Journal>,
}

impl TestOp {
    pub fn new(name: impl Into<String>, journal: &Arc<Journal>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            requisites: 0,
            products: 1,
            behavior: Behavior::Update,
            delay: Duration::ZERO,
            journal: Arc::clone(journal),
        }
    }

    pub fn requisites(mut self, count: usize) -> Self {
        self.requisites = count;
        self
    }

    pub fn products(mut self, count: usize) -> Self {
        self.products = count;
        self
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn build(self) -> Arc<dyn Operator> {
        Arc::new(self)
    }
}

impl Operator for TestOp {
    fn id(&self) -> EntityId {
        self.id
    }

    fn info(&self) -> OperatorInfo {
        OperatorInfo::new("test", self.name.clone())
    }

    fn requisite_schema(&self) -> Schema {
        Schema::declare(self.requisites, Vec::<(String, usize)>::new()).unwrap()
    }

    fn product_schema(&self) -> Schema {
        Schema::declare(self.products, Vec::<(String, usize)>::new()).unwrap()
    }

    fn apply(&self, action: &Action<'_>, requisites: &Storage, products: &mut Storage) -> Outcome {
        let journal = &self.journal;
        let running = journal.running.fetch_add(1, Ordering::SeqCst) + 1;
        journal.max_running.fetch_max(running, Ordering::SeqCst);
        journal.record(&self.name, Phase::Start, action.requisites_updated());

        // Every requisite slot is fed by an edge in these tests.
        assert_eq!(requisites.populated(), requisites.len(), "{} ran early", self.name);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let outcome = match &self.behavior {
            Behavior::Update => Outcome::Updated(Freshness::now()),
            Behavior::UpdateAt(freshness) => Outcome::Updated(*freshness),
            Behavior::Skip => Outcome::Skipped,
            Behavior::Fail(message) => Outcome::Failed(KilnError::operator(&self.name, message)),
            Behavior::Panic(message) => {
                journal.running.fetch_sub(1, Ordering::SeqCst);
                journal.record(&self.name, Phase::End, action.requisites_updated());
                panic!("{}", message);
            }
            Behavior::WaitForAbort(timeout) => {
                let deadline = Instant::now() + *timeout;
                while !action.is_cancelled() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(1));
                }
                match action.check_cancelled() {
                    Ok(()) => Outcome::Updated(Freshness::now()),
                    Err(err) => Outcome::Failed(err),
                }
            }
            Behavior::DropProduct => {
                let _ = products.take(0);
                Outcome::Updated(Freshness::now())
            }
        };

        journal.running.fetch_sub(1, Ordering::SeqCst);
        journal.record(&self.name, Phase::End, action.requisites_updated());
        outcome
    }
}

/// Connect `from`'s product slot to `to`'s requisite slot with a fresh stamp.
pub fn link(
    graph: &mut Graph,
    from: &Arc<dyn Operator>,
    product: usize,
    to: &Arc<dyn Operator>,
    requisite: usize,
) -> EdgeId {
    let mark = Stamp::new(format!("{}->{}", from.info().short_name, to.info().short_name));
    graph
        .add_edge(from, product, to, requisite, mark.into_ref())
        .unwrap()
}

/// Context with a small pool for tests.
pub fn test_context(workers: usize) -> Context {
    Context::new(
        ContextConfig::default()
            .with_workers(workers)
            .with_quiescence_timeout(Duration::from_secs(30)),
    )
    .unwrap()
}

/// Bound used when waiting for test runs.
pub const WAIT: Duration = Duration::from_secs(30);
