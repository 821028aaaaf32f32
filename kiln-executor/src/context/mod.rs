//! Execution context: worker pool, mark cache and quiescence.
//!
//! A [`Context`] owns the threads every schedule runs on. Items are handed
//! to the pool fire-and-forget; the only blocking calls are the bounded
//! waits on [`Context::await_quiescence`] and
//! [`Schedule::wait`](crate::Schedule::wait).

mod config;
mod quiescence;

pub use config::{ContextConfig, DEFAULT_QUIESCENCE_TIMEOUT, FailurePolicy};
pub(crate) use quiescence::{Pending, Quiescence};

use kiln_core::error::{KilnError, Result};
use kiln_core::logging::{BufferedCollector, LogCategory, LogCollector, LogContext, LogEvent};
use kiln_core::mark::MarkInfoCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};

/// The shared half of a context, held by every schedule compiled against it.
pub(crate) struct Dispatcher {
    handle: Handle,
    in_flight: Arc<Quiescence>,
    marks: MarkInfoCache,
    collector: Arc<BufferedCollector>,
    policy: FailurePolicy,
}

impl Dispatcher {
    /// Hand `task` to the worker pool.
    ///
    /// Both the context-wide and the per-run counts are raised before the
    /// task is queued and lowered when it finishes, or when the pool refuses
    /// it.
    pub(crate) fn submit<F>(&self, run: &Arc<Quiescence>, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let held = (Pending::enter(&self.in_flight), Pending::enter(run));
        // The join handle is not needed; completion is observed through the latches.
        drop(self.handle.spawn_blocking(move || {
            let _held = held;
            task();
        }));
    }

    /// Hold both latches open while a batch is being submitted.
    pub(crate) fn hold(&self, run: &Arc<Quiescence>) -> (Pending, Pending) {
        (Pending::enter(&self.in_flight), Pending::enter(run))
    }

    pub(crate) fn marks(&self) -> &MarkInfoCache {
        &self.marks
    }

    pub(crate) fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub(crate) fn log(&self) -> LogContext {
        LogContext::new(Arc::clone(&self.collector) as Arc<dyn LogCollector>)
    }
}

/// The environment schedules execute in.
///
/// Dropping the context shuts the pool down, waiting up to the configured
/// quiescence timeout for applying operators to return.
pub struct Context {
    runtime: Option<Runtime>,
    dispatcher: Arc<Dispatcher>,
    config: ContextConfig,
}

impl Context {
    /// Create a context with its own worker pool.
    pub fn new(config: ContextConfig) -> Result<Self> {
        let workers = config.workers.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name(config.thread_name.clone())
            .build()
            .map_err(|e| KilnError::Runtime {
                cause: e.to_string(),
            })?;

        let collector = Arc::new(BufferedCollector::new(config.log_buffer_capacity));
        let dispatcher = Arc::new(Dispatcher {
            handle: runtime.handle().clone(),
            in_flight: Arc::new(Quiescence::new()),
            marks: MarkInfoCache::new(),
            collector,
            policy: config.failure_policy,
        });

        tracing::debug!(
            workers,
            failure_policy = %config.failure_policy,
            "Execution context started"
        );
        dispatcher.log().log(
            LogEvent::debug(LogCategory::System, "Execution context started")
                .with_field_u64("workers", workers as u64),
        );

        Ok(Self {
            runtime: Some(runtime),
            dispatcher,
            config,
        })
    }

    /// Create a context configured from `KILN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ContextConfig::from_env())
    }

    /// Wait until no dispatched item is pending, for at most `timeout`.
    ///
    /// Returns true if the pool went idle in time.
    pub fn await_quiescence(&self, timeout: Duration) -> bool {
        self.dispatcher.in_flight.wait(timeout)
    }

    /// [`await_quiescence`](Self::await_quiescence) with the configured timeout.
    pub fn await_termination(&self) -> bool {
        let settled = self.await_quiescence(self.config.quiescence_timeout);
        if !settled {
            tracing::warn!(
                pending = self.pending(),
                timeout_ms = self.config.quiescence_timeout.as_millis() as u64,
                "Timed out waiting for the worker pool to go idle"
            );
        }
        settled
    }

    /// Number of dispatched items that have not finished.
    pub fn pending(&self) -> usize {
        self.dispatcher.in_flight.pending()
    }

    /// Cross-run mark freshness cache.
    pub fn marks(&self) -> &MarkInfoCache {
        self.dispatcher.marks()
    }

    /// Structured diagnostics shared by every run of this context.
    pub fn log_collector(&self) -> &Arc<BufferedCollector> {
        &self.dispatcher.collector
    }

    /// The configuration this context was built with.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub(crate) fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(self.config.quiescence_timeout);
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .field("marks", &self.marks().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn idle_context_is_quiescent() {
        let ctx = Context::new(ContextConfig::default().with_workers(2)).unwrap();
        assert!(ctx.await_quiescence(Duration::ZERO));
        assert_eq!(ctx.pending(), 0);
        assert!(ctx.marks().is_empty());
    }

    #[test]
    fn submitted_tasks_are_awaited() {
        let ctx = Context::new(ContextConfig::default().with_workers(3)).unwrap();
        let run = Arc::new(Quiescence::new());
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..32 {
            let done = Arc::clone(&done);
            ctx.dispatcher().submit(&run, move || {
                std::thread::sleep(Duration::from_millis(1));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(ctx.await_quiescence(Duration::from_secs(10)));
        assert!(run.wait(Duration::ZERO));
        assert_eq!(done.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn workers_run_on_named_threads() {
        let ctx = Context::new(ContextConfig::default().with_thread_name("kiln-test")).unwrap();
        let run = Arc::new(Quiescence::new());
        let name = Arc::new(parking_lot::Mutex::new(None));

        let seen = Arc::clone(&name);
        ctx.dispatcher().submit(&run, move || {
            *seen.lock() = std::thread::current().name().map(str::to_string);
        });

        assert!(ctx.await_quiescence(Duration::from_secs(10)));
        assert_eq!(name.lock().as_deref(), Some("kiln-test"));
    }
}
