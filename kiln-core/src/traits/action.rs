//! Per-apply context handed to operators.

use crate::error::{KilnError, Result};
use crate::logging::LogContext;
use crate::mark::MarkInfoCache;
use crate::types::{Freshness, ScheduleId, VertexId};
use std::sync::atomic::{AtomicBool, Ordering};

/// What an operator can see and ask while it applies.
///
/// An action lives for exactly one `apply` call. It carries the freshness
/// high-water mark of the item's requisites, the shared mark cache and the
/// run's cancellation flag.
pub struct Action<'a> {
    schedule_id: ScheduleId,
    vertex: VertexId,
    requisites_updated: Freshness,
    marks: &'a MarkInfoCache,
    cancelled: &'a AtomicBool,
    log: LogContext,
}

impl<'a> Action<'a> {
    /// Create an action.
    pub fn new(
        schedule_id: ScheduleId,
        vertex: VertexId,
        requisites_updated: Freshness,
        marks: &'a MarkInfoCache,
        cancelled: &'a AtomicBool,
        log: LogContext,
    ) -> Self {
        Self {
            schedule_id,
            vertex,
            requisites_updated,
            marks,
            cancelled,
            log,
        }
    }

    /// The run this action belongs to.
    pub fn schedule_id(&self) -> ScheduleId {
        self.schedule_id
    }

    /// The vertex being applied.
    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    /// Latest freshness among everything the predecessors produced.
    pub fn requisites_updated(&self) -> Freshness {
        self.requisites_updated
    }

    /// True if a product last refreshed at `product` predates the requisites.
    pub fn is_stale(&self, product: Freshness) -> bool {
        product.is_min() || self.requisites_updated.is_after(product)
    }

    /// The context's cross-run mark freshness cache.
    pub fn marks(&self) -> &'a MarkInfoCache {
        self.marks
    }

    /// Whether the run has been aborted.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail with [`KilnError::Cancelled`] if the run has been aborted.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(KilnError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Log context correlated with this run and vertex.
    pub fn log(&self) -> &LogContext {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness() {
        let marks = MarkInfoCache::new();
        let cancelled = AtomicBool::new(false);
        let action = Action::new(
            ScheduleId::new(),
            VertexId::new(0),
            Freshness::from_nanos(100),
            &marks,
            &cancelled,
            LogContext::null(),
        );

        assert!(action.is_stale(Freshness::MIN));
        assert!(action.is_stale(Freshness::from_nanos(99)));
        assert!(!action.is_stale(Freshness::from_nanos(100)));
        assert!(!action.is_stale(Freshness::from_nanos(101)));
    }

    #[test]
    fn cancellation_is_observed() {
        let marks = MarkInfoCache::new();
        let cancelled = AtomicBool::new(false);
        let action = Action::new(
            ScheduleId::new(),
            VertexId::new(1),
            Freshness::MIN,
            &marks,
            &cancelled,
            LogContext::null(),
        );

        assert!(action.check_cancelled().is_ok());
        cancelled.store(true, Ordering::Release);
        assert!(matches!(action.check_cancelled(), Err(KilnError::Cancelled)));
    }
}
