//! Packs: declared slot sets and their per-run contents.
//!
//! A [`Schema`] is the immutable template an operator declares for its
//! requisites or products. A [`Selector`] names one of its slots and is
//! resolved once, while the graph is declared, into a bound [`Getter`] or
//! [`Setter`]. Every run allocates its own [`Storage`] from the template.

mod schema;
mod storage;

pub use schema::{Getter, Schema, SchemaBuilder, Selector, Setter};
pub use storage::Storage;
