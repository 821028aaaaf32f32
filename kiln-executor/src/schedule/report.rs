//! Run status and diagnostic reports.

use super::item::ItemState;
use kiln_core::error::KilnError;
use kiln_core::types::{Freshness, ScheduleId, VertexId};
use std::fmt;

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// Compiled but not started.
    Idle,
    /// Items are still pending on the worker pool.
    Running,
    /// Settled with every item applied successfully.
    Completed,
    /// Settled after at least one operator failed.
    Failed,
    /// Settled after the run was aborted.
    Aborted,
}

impl RunStatus {
    /// Whether the run has settled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one item.
#[derive(Debug, Clone)]
pub struct ItemReport {
    /// The vertex the item mirrors.
    pub vertex: VertexId,
    /// Operator name.
    pub operator: String,
    /// State at snapshot time.
    pub state: ItemState,
    /// Frozen predecessor count.
    pub predecessors: usize,
    /// Predecessors that have completed.
    pub completed_predecessors: usize,
    /// Requisite high-water mark.
    pub requisites_updated: Freshness,
    /// Freshness propagated to dependents.
    pub products_updated: Freshness,
    /// Why the item failed, if it did.
    pub failure: Option<KilnError>,
}

/// Snapshot of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The run.
    pub schedule_id: ScheduleId,
    /// Status at snapshot time.
    pub status: RunStatus,
    /// Items indexed by vertex.
    pub items: Vec<ItemReport>,
    /// Items handed to the worker pool.
    pub dispatched: usize,
    /// Items whose operator began applying.
    pub started: usize,
    /// Items that finished as updated or skipped.
    pub completed: usize,
    /// Dispatched items not yet finished.
    pub pending: usize,
}

impl RunReport {
    /// Number of items in `state`.
    pub fn count(&self, state: ItemState) -> usize {
        self.items.iter().filter(|item| item.state == state).count()
    }

    /// The item for `vertex`.
    pub fn item(&self, vertex: VertexId) -> Option<&ItemReport> {
        self.items.get(vertex.index())
    }

    /// Failed items with their causes.
    pub fn failures(&self) -> impl Iterator<Item = (&ItemReport, &KilnError)> {
        self.items
            .iter()
            .filter_map(|item| item.failure.as_ref().map(|err| (item, err)))
    }

    /// One line per item, for logs and test failure messages.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "schedule {} {}: dispatched={} started={} completed={} pending={}",
            self.schedule_id,
            self.status,
            self.dispatched,
            self.started,
            self.completed,
            self.pending
        )];
        for item in &self.items {
            let mut line = format!("  {} {} {}", item.vertex, item.operator, item.state);
            if let Some(err) = &item.failure {
                line.push_str(&format!(" ({})", err));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
