//! Kiln Executor - graph compilation and concurrent scheduling.
//!
//! This crate runs the operators declared with `kiln-core`:
//! - [`Graph`]: dependency multigraph with cycle verification
//! - [`Schedule`]: single-use runtime mirror of a graph, one item per vertex
//! - [`Context`]: worker pool, mark cache and bounded quiescence waits
//! - Tracing subscriber setup in [`observability`]
//!
//! # Example
//!
//! ```ignore
//! use kiln_executor::prelude::*;
//!
//! let context = Context::new(ContextConfig::default())?;
//! let mut graph = Graph::new();
//! graph.add_edge(&compile, "object", &link, "objects", object_mark)?;
//! assert!(graph.verify());
//!
//! let schedule = graph.compile(&context)?;
//! schedule.start();
//! context.await_termination();
//! assert_eq!(schedule.status(), RunStatus::Completed);
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod graph;
pub mod observability;
pub mod schedule;

pub use context::{Context, ContextConfig, FailurePolicy};
pub use graph::{Cycle, CycleReport, Edge, Graph, Vertex};
pub use schedule::{ItemReport, ItemState, RunReport, RunStatus, Schedule};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::context::{Context, ContextConfig, FailurePolicy};
    pub use crate::graph::{Cycle, CycleReport, Graph};
    pub use crate::observability::{LogFormat, TracingConfig, init_tracing};
    pub use crate::schedule::{ItemState, RunReport, RunStatus, Schedule};
    pub use kiln_core::prelude::*;
}
