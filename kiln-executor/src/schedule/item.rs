//! Per-vertex runtime state of one run.

use kiln_core::error::{KilnError, Result};
use kiln_core::pack::{Getter, Setter, Storage};
use kiln_core::traits::Operator;
use kiln_core::types::{AtomicFreshness, Freshness, VertexId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Lifecycle state of a scheduling item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Predecessors have not all completed.
    Waiting,
    /// The operator is applying.
    Running,
    /// The operator refreshed its products.
    Updated,
    /// The operator decided no work was needed.
    Skipped,
    /// The operator failed or panicked.
    Failed,
    /// Dispatched after the run was aborted; nothing was applied.
    Cancelled,
    /// Never became ready because an upstream item failed or the run was
    /// aborted. Only reported for settled runs.
    Blocked,
}

impl ItemState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Running => 1,
            Self::Updated => 2,
            Self::Skipped => 3,
            Self::Failed => 4,
            Self::Cancelled => 5,
            Self::Blocked => 6,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Updated,
            3 => Self::Skipped,
            4 => Self::Failed,
            5 => Self::Cancelled,
            6 => Self::Blocked,
            _ => Self::Waiting,
        }
    }

    /// Whether the operator ran to a successful outcome.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Updated | Self::Skipped)
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound connection from a producer item to one dependent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Link {
    pub(crate) getter: Getter,
    pub(crate) setter: Setter,
    pub(crate) target: usize,
}

/// One vertex's slice of a run.
pub(crate) struct Item {
    pub(crate) vertex: VertexId,
    pub(crate) operator: Arc<dyn Operator>,
    pub(crate) name: String,
    predecessors: usize,
    completed: AtomicUsize,
    requisites_updated: AtomicFreshness,
    products_updated: AtomicFreshness,
    pub(crate) requisites: Mutex<Storage>,
    pub(crate) products: Mutex<Storage>,
    links: Mutex<Vec<Link>>,
    state: AtomicU8,
    failure: Mutex<Option<KilnError>>,
}

impl Item {
    pub(crate) fn new(
        vertex: VertexId,
        operator: Arc<dyn Operator>,
        name: String,
        predecessors: usize,
        requisites: Storage,
        products: Storage,
        links: Vec<Link>,
    ) -> Self {
        Self {
            vertex,
            operator,
            name,
            predecessors,
            completed: AtomicUsize::new(0),
            requisites_updated: AtomicFreshness::new(Freshness::MIN),
            products_updated: AtomicFreshness::new(Freshness::MIN),
            requisites: Mutex::new(requisites),
            products: Mutex::new(products),
            links: Mutex::new(links),
            state: AtomicU8::new(ItemState::Waiting.to_u8()),
            failure: Mutex::new(None),
        }
    }

    /// Record one finished predecessor.
    ///
    /// Advances the requisite high-water mark first, then counts the
    /// predecessor. Returns true for exactly the call that completes the
    /// frozen predecessor count.
    pub(crate) fn mark_ready(&self, candidate: Freshness) -> bool {
        self.requisites_updated.advance(candidate);
        self.completed.fetch_add(1, Ordering::AcqRel) + 1 == self.predecessors
    }

    /// Take the outbound links, leaving the list empty.
    pub(crate) fn take_links(&self) -> Vec<Link> {
        std::mem::take(&mut *self.links.lock())
    }

    /// Fail if any outbound link reads a slot that is empty in `products`.
    pub(crate) fn check_links(&self, products: &Storage) -> Result<()> {
        for link in self.links.lock().iter() {
            link.getter.get(products)?;
        }
        Ok(())
    }

    pub(crate) fn link_count(&self) -> usize {
        self.links.lock().len()
    }

    pub(crate) fn predecessors(&self) -> usize {
        self.predecessors
    }

    pub(crate) fn completed_predecessors(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub(crate) fn requisites_updated(&self) -> Freshness {
        self.requisites_updated.load()
    }

    pub(crate) fn products_updated(&self) -> Freshness {
        self.products_updated.load()
    }

    pub(crate) fn advance_products(&self, freshness: Freshness) -> Freshness {
        self.products_updated.advance(freshness)
    }

    pub(crate) fn state(&self) -> ItemState {
        ItemState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ItemState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    pub(crate) fn fail(&self, err: KilnError) {
        *self.failure.lock() = Some(err);
        self.set_state(ItemState::Failed);
    }

    pub(crate) fn failure(&self) -> Option<KilnError> {
        self.failure.lock().clone()
    }
}
