//! Runtime tracker for one execution of a compiled graph.
//!
//! A [`Schedule`] mirrors its graph with one item per vertex. Roots are
//! dispatched by [`Schedule::start`]; every finished item copies its product
//! marks into its dependents' requisites and dispatches each dependent whose
//! last predecessor it was. A schedule runs once: compile the graph again for
//! another run.

mod item;
mod report;

pub use item::ItemState;
pub(crate) use item::{Item, Link};
pub use report::{ItemReport, RunReport, RunStatus};

use crate::context::{Dispatcher, FailurePolicy, Quiescence};
use kiln_core::error::{KilnError, Result};
use kiln_core::logging::{LogCategory, LogContext, LogEvent};
use kiln_core::mark::MarkInfo;
use kiln_core::pack::Storage;
use kiln_core::traits::{Action, Outcome};
use kiln_core::types::{Freshness, ScheduleId, VertexId};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::instrument;

/// Shared state of one run, referenced by every dispatched item.
struct RunState {
    id: ScheduleId,
    items: Vec<Item>,
    roots: Mutex<Vec<usize>>,
    started: AtomicBool,
    aborted: AtomicBool,
    failed: AtomicBool,
    pending: Arc<Quiescence>,
    dispatcher: Arc<Dispatcher>,
    log: LogContext,
    dispatched: AtomicUsize,
    applied: AtomicUsize,
    completed: AtomicUsize,
}

impl RunState {
    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    fn abort(&self) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            tracing::info!(schedule_id = %self.id, "Run aborted");
            self.log.warn(LogCategory::Schedule, "Run aborted");
        }
    }

    fn submit(self: &Arc<Self>, index: usize) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let run = Arc::clone(self);
        self.dispatcher
            .submit(&self.pending, move || run.execute(index));
    }

    /// Apply one ready item and fan out on success.
    fn execute(self: &Arc<Self>, index: usize) {
        let item = &self.items[index];
        let log = self.log.for_vertex(item.vertex, item.name.clone());

        if self.is_aborted() {
            item.set_state(ItemState::Cancelled);
            tracing::debug!(
                schedule_id = %self.id,
                vertex = %item.vertex,
                operator = %item.name,
                "Item cancelled before applying"
            );
            log.debug(LogCategory::Schedule, "Item cancelled before applying");
            return;
        }

        item.set_state(ItemState::Running);
        self.applied.fetch_add(1, Ordering::Relaxed);

        let requisites_updated = item.requisites_updated();
        let requisites = item.requisites.lock().clone();
        let mut products = item.products.lock().clone();

        let span = tracing::debug_span!(
            "apply",
            schedule_id = %self.id,
            vertex = %item.vertex,
            operator = %item.name,
        );
        let outcome = span.in_scope(|| {
            let action = Action::new(
                self.id,
                item.vertex,
                requisites_updated,
                self.dispatcher.marks(),
                &self.aborted,
                log.clone(),
            );
            panic::catch_unwind(AssertUnwindSafe(|| {
                item.operator.apply(&action, &requisites, &mut products)
            }))
            .unwrap_or_else(|payload| {
                Outcome::Failed(KilnError::OperatorPanic {
                    operator: item.name.clone(),
                    message: panic_message(payload.as_ref()),
                })
            })
        });

        match outcome {
            Outcome::Updated(freshness) => {
                for (_, mark) in products.marks() {
                    self.dispatcher
                        .marks()
                        .record(mark.id(), MarkInfo::new(freshness));
                }
                item.advance_products(freshness);
                *item.products.lock() = products;
                self.finish(index, ItemState::Updated, freshness, &log);
            }
            Outcome::Skipped => {
                let known = products
                    .marks()
                    .filter_map(|(_, mark)| self.dispatcher.marks().known(mark.id()))
                    .map(|info| info.freshness)
                    .max()
                    .unwrap_or(Freshness::MIN);
                let freshness = item.advance_products(requisites_updated.max(known));
                *item.products.lock() = products;
                self.finish(index, ItemState::Skipped, freshness, &log);
            }
            Outcome::Failed(KilnError::Cancelled) if self.is_aborted() => {
                *item.products.lock() = products;
                item.set_state(ItemState::Cancelled);
                log.info(LogCategory::Operator, "Operator stopped after abort");
            }
            Outcome::Failed(err) => {
                *item.products.lock() = products;
                self.fail(item, err, &log);
            }
        }
    }

    fn finish(self: &Arc<Self>, index: usize, state: ItemState, freshness: Freshness, log: &LogContext) {
        let item = &self.items[index];
        let checked = item.check_links(&item.products.lock());
        if let Err(err) = checked {
            // The operator cleared a product slot a dependent reads.
            self.fail(item, err, log);
            return;
        }
        item.set_state(state);
        self.completed.fetch_add(1, Ordering::AcqRel);

        tracing::debug!(
            schedule_id = %self.id,
            vertex = %item.vertex,
            operator = %item.name,
            outcome = %state,
            freshness = %freshness,
            "Operator finished"
        );
        log.log(
            LogEvent::debug(LogCategory::Operator, "Operator finished")
                .with_field("outcome", state.as_str())
                .with_field_u64("freshness", freshness.as_nanos()),
        );

        self.schedule_next(index, freshness, log);
    }

    fn fail(&self, item: &Item, err: KilnError, log: &LogContext) {
        tracing::error!(
            schedule_id = %self.id,
            vertex = %item.vertex,
            operator = %item.name,
            error = %err,
            "Operator failed"
        );
        log.log(
            LogEvent::error(LogCategory::Operator, "Operator failed")
                .with_field("error", err.to_string()),
        );

        item.fail(err);
        self.failed.store(true, Ordering::Release);
        if self.dispatcher.policy() == FailurePolicy::AbortRun {
            self.abort();
        }
    }

    /// Propagate products to dependents and dispatch the ones now ready.
    fn schedule_next(self: &Arc<Self>, index: usize, freshness: Freshness, log: &LogContext) {
        let item = &self.items[index];
        let links = item.take_links();
        if links.is_empty() {
            return;
        }
        let products = item.products.lock().clone();

        for link in links {
            if self.is_aborted() {
                break;
            }

            let target = &self.items[link.target];
            let copied = link.getter.get(&products).and_then(|mark| {
                let mut requisites = target.requisites.lock();
                link.setter.set(&mut requisites, mark)
            });
            if let Err(err) = copied {
                self.fail(item, err, log);
                break;
            }

            if target.mark_ready(freshness) && !self.is_aborted() {
                self.submit(link.target);
            }
        }
    }

    fn status(&self) -> RunStatus {
        if !self.started.load(Ordering::Acquire) {
            RunStatus::Idle
        } else if self.pending.pending() > 0 {
            RunStatus::Running
        } else if self.failed.load(Ordering::Acquire) {
            RunStatus::Failed
        } else if self.is_aborted() {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// One single-use execution of a compiled graph.
///
/// Cloning a schedule yields another handle to the same run.
#[derive(Clone)]
pub struct Schedule {
    state: Arc<RunState>,
}

impl Schedule {
    pub(crate) fn new(
        id: ScheduleId,
        items: Vec<Item>,
        roots: Vec<usize>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let log = dispatcher.log().with_schedule_id(id);
        Self {
            state: Arc::new(RunState {
                id,
                items,
                roots: Mutex::new(roots),
                started: AtomicBool::new(false),
                aborted: AtomicBool::new(false),
                failed: AtomicBool::new(false),
                pending: Arc::new(Quiescence::new()),
                dispatcher,
                log,
                dispatched: AtomicUsize::new(0),
                applied: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
            }),
        }
    }

    /// Correlation ID of this run.
    pub fn id(&self) -> ScheduleId {
        self.state.id
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.state.items.len()
    }

    /// Whether the schedule has no items.
    pub fn is_empty(&self) -> bool {
        self.state.items.is_empty()
    }

    /// Vertices still waiting to be dispatched as roots. Empty once started.
    pub fn roots(&self) -> Vec<VertexId> {
        self.state
            .roots
            .lock()
            .iter()
            .map(|&index| self.state.items[index].vertex)
            .collect()
    }

    /// Dispatch every root item to the worker pool.
    ///
    /// Returns without waiting. A second call does nothing.
    #[instrument(skip(self), fields(schedule_id = %self.id(), items = self.len()))]
    pub fn start(&self) {
        let state = &self.state;
        // Keep the run from looking settled between root submissions.
        let _held = state.dispatcher.hold(&state.pending);

        if state.started.swap(true, Ordering::AcqRel) {
            tracing::warn!(schedule_id = %state.id, "Schedule already started");
            state
                .log
                .warn(LogCategory::Schedule, "Schedule already started");
            return;
        }

        let roots = std::mem::take(&mut *state.roots.lock());
        tracing::info!(schedule_id = %state.id, roots = roots.len(), "Run started");
        state.log.log(
            LogEvent::info(LogCategory::Schedule, "Run started")
                .with_field_u64("items", state.items.len() as u64)
                .with_field_u64("roots", roots.len() as u64),
        );

        for index in roots {
            if state.is_aborted() {
                break;
            }
            state.submit(index);
        }
    }

    /// Stop dispatching new items. Applying operators finish on their own
    /// and can observe the flag through [`Action::is_cancelled`].
    pub fn abort(&self) {
        self.state.abort();
    }

    /// Whether [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.state.is_aborted()
    }

    /// Current status of the run.
    pub fn status(&self) -> RunStatus {
        self.state.status()
    }

    /// Wait for this run to settle, for at most `timeout`.
    ///
    /// Returns true if nothing of this run is pending. A run that has not
    /// started is trivially settled.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.state.pending.wait(timeout)
    }

    /// Snapshot the run.
    pub fn report(&self) -> RunReport {
        let state = &self.state;
        let status = state.status();
        let blocked = status.is_terminal();

        let items = state
            .items
            .iter()
            .map(|item| {
                let mut item_state = item.state();
                if blocked && item_state == ItemState::Waiting && status != RunStatus::Completed {
                    item_state = ItemState::Blocked;
                }
                ItemReport {
                    vertex: item.vertex,
                    operator: item.name.clone(),
                    state: item_state,
                    predecessors: item.predecessors(),
                    completed_predecessors: item.completed_predecessors(),
                    requisites_updated: item.requisites_updated(),
                    products_updated: item.products_updated(),
                    failure: item.failure(),
                }
            })
            .collect();

        RunReport {
            schedule_id: state.id,
            status,
            items,
            dispatched: state.dispatched.load(Ordering::Acquire),
            started: state.applied.load(Ordering::Acquire),
            completed: state.completed.load(Ordering::Acquire),
            pending: state.pending.pending(),
        }
    }

    fn item(&self, vertex: VertexId) -> Result<&Item> {
        self.state
            .items
            .get(vertex.index())
            .ok_or(KilnError::UnknownVertex { vertex })
    }

    /// State of one item.
    pub fn state(&self, vertex: VertexId) -> Result<ItemState> {
        self.item(vertex).map(Item::state)
    }

    /// Frozen predecessor count of one item.
    pub fn predecessor_count(&self, vertex: VertexId) -> Result<usize> {
        self.item(vertex).map(Item::predecessors)
    }

    /// Outbound links not yet propagated. Links are consumed as the item
    /// fans out.
    pub fn link_count(&self, vertex: VertexId) -> Result<usize> {
        self.item(vertex).map(Item::link_count)
    }

    /// Copy of one item's requisite storage.
    pub fn requisites(&self, vertex: VertexId) -> Result<Storage> {
        self.item(vertex).map(|item| item.requisites.lock().clone())
    }

    /// Copy of one item's product storage.
    pub fn products(&self, vertex: VertexId) -> Result<Storage> {
        self.item(vertex).map(|item| item.products.lock().clone())
    }

    /// Run `f` with exclusive access to one item's product storage.
    ///
    /// Changes made before the run starts are what the operator and its
    /// dependents see.
    pub fn with_products<R>(&self, vertex: VertexId, f: impl FnOnce(&mut Storage) -> R) -> Result<R> {
        let item = self.item(vertex)?;
        let mut products = item.products.lock();
        Ok(f(&mut products))
    }
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("id", &self.id())
            .field("items", &self.len())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(17u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
