//! Structured diagnostics for graph verification and build runs.
//!
//! Alongside `tracing` output, the executor records events into a
//! [`LogCollector`] so callers can inspect what a run did after it ends:
//!
//! - **Correlation IDs**: events carry the schedule, vertex and operator
//! - **Buffered Collection**: thread-safe ring buffer for in-memory storage
//! - **Queries**: by schedule, vertex, category or minimum level
//!
//! # Example
//!
//! ```ignore
//! use kiln_core::logging::{BufferedCollector, LogCategory, LogContext, LogLevel};
//! use std::sync::Arc;
//!
//! let collector = Arc::new(BufferedCollector::with_default_capacity());
//! let ctx = LogContext::new(collector.clone()).with_schedule_id(schedule_id);
//! ctx.for_vertex(vertex, "os::exec").info(LogCategory::Operator, "Applied");
//!
//! let errors = collector.by_level(LogLevel::Error);
//! ```

mod collector;
mod event;

pub use collector::{
    BufferedCollector, DEFAULT_BUFFER_CAPACITY, LogCollector, LogContext, NullCollector,
};
pub use event::{LogCategory, LogEvent, LogLevel};
