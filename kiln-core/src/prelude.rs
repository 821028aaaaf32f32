//! Prelude for convenient imports.
//!
//! ```ignore
//! use kiln_core::prelude::*;
//! ```

// Core types
pub use crate::types::{AtomicFreshness, EdgeId, EntityId, Freshness, ScheduleId, VertexId};

// Error handling
pub use crate::error::{KilnError, Result, ResultExt};

// Marks
pub use crate::mark::{Mark, MarkInfo, MarkInfoCache, MarkRef, Stamp};

// Packs
pub use crate::pack::{Getter, Schema, SchemaBuilder, Selector, Setter, Storage};

// Traits
pub use crate::traits::{Action, Operator, OperatorInfo, Outcome};

// Logging
pub use crate::logging::{
    BufferedCollector, LogCategory, LogCollector, LogContext, LogEvent, LogLevel,
};
