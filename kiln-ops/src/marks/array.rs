//! Composite mark over a fixed set of marks.

use kiln_core::{EntityId, Freshness, Mark, MarkInfo, MarkRef, Result};
use std::any::Any;
use std::sync::Arc;

/// An immutable collection of marks, fresh as of its freshest member.
#[derive(Debug, Clone)]
pub struct MarkArray {
    id: EntityId,
    nested: Arc<[MarkRef]>,
}

impl MarkArray {
    /// Group `marks` under a new identity.
    pub fn new(marks: impl IntoIterator<Item = MarkRef>) -> Self {
        Self {
            id: EntityId::new(),
            nested: marks.into_iter().collect(),
        }
    }

    /// The nested marks, in declaration order.
    pub fn marks(&self) -> &[MarkRef] {
        &self.nested
    }

    /// Number of nested marks.
    pub fn len(&self) -> usize {
        self.nested.len()
    }

    /// Whether the array has no members.
    pub fn is_empty(&self) -> bool {
        self.nested.is_empty()
    }

    /// Wrap into a shared mark handle.
    pub fn into_ref(self) -> MarkRef {
        Arc::new(self)
    }
}

impl Mark for MarkArray {
    fn id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> &'static str {
        "array"
    }

    fn probe(&self) -> Result<MarkInfo> {
        let mut freshness = Freshness::MIN;
        for mark in self.nested.iter() {
            freshness = freshness.max(mark.probe()?.freshness);
        }
        Ok(MarkInfo::new(freshness))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
