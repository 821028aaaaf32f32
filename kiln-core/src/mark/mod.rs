//! Marks: the facts operators consume and produce.
//!
//! A mark is anything with an identity and a probeable freshness: a file on
//! disk, a derived artifact, a virtual target. The scheduler only moves marks
//! between slots and compares their [`MarkInfo`]; concrete kinds live in
//! plug-in crates and are recovered by downcasting.

mod cache;

pub use cache::MarkInfoCache;

use crate::error::Result;
use crate::types::{EntityId, Freshness};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Freshness record of a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarkInfo {
    /// When the fact was last brought up to date.
    pub freshness: Freshness,
}

impl MarkInfo {
    /// Create an info record.
    pub const fn new(freshness: Freshness) -> Self {
        Self { freshness }
    }

    /// Keep whichever record is later. Ties keep `self`.
    #[must_use]
    pub fn merge(self, other: MarkInfo) -> MarkInfo {
        if other.freshness.is_after(self.freshness) {
            other
        } else {
            self
        }
    }
}

/// A tracked fact with identity and freshness.
pub trait Mark: Any + Send + Sync + fmt::Debug {
    /// Identity of the fact.
    fn id(&self) -> EntityId;

    /// Short name of the concrete mark kind, used in diagnostics.
    fn kind(&self) -> &'static str;

    /// Observe the current freshness of the fact.
    fn probe(&self) -> Result<MarkInfo>;

    /// Access the concrete value for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl dyn Mark {
    /// Downcast to a concrete mark kind.
    pub fn downcast_ref<M: Mark>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    /// Whether the mark is of concrete kind `M`.
    pub fn is<M: Mark>(&self) -> bool {
        self.as_any().is::<M>()
    }
}

/// Shared handle to a mark.
pub type MarkRef = Arc<dyn Mark>;

/// An in-memory fact with a fixed freshness.
///
/// Useful for virtual targets that have no backing artifact. A new stamp
/// value (not a mutation) represents new work; [`Stamp::touched`] keeps the
/// identity and advances the freshness.
#[derive(Debug, Clone)]
pub struct Stamp {
    id: EntityId,
    name: String,
    freshness: Freshness,
}

impl Stamp {
    /// Create a stamp that has never been produced.
    pub fn new(name: impl Into<String>) -> Self {
        Self::at(name, Freshness::MIN)
    }

    /// Create a stamp with an explicit freshness.
    pub fn at(name: impl Into<String>, freshness: Freshness) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            freshness,
        }
    }

    /// The same fact, refreshed to `freshness`.
    #[must_use]
    pub fn touched(&self, freshness: Freshness) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            freshness,
        }
    }

    /// Name of the stamp.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed freshness of the stamp.
    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// Wrap into a shared mark handle.
    pub fn into_ref(self) -> MarkRef {
        Arc::new(self)
    }
}

impl Mark for Stamp {
    fn id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> &'static str {
        "stamp"
    }

    fn probe(&self) -> Result<MarkInfo> {
        Ok(MarkInfo::new(self.freshness))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
