//! Core types for Kiln.
//!
//! - `EntityId`: identity of operators and marks
//! - `ScheduleId`: correlation ID of one execution run
//! - `VertexId` / `EdgeId`: dense indices inside a graph
//! - `Freshness`: comparable timestamp used for staleness decisions

mod freshness;
mod ids;

pub use freshness::{AtomicFreshness, Freshness};
pub use ids::{EdgeId, EntityId, ScheduleId, VertexId};
