//! Kiln Core Library
//!
//! Foundational types and traits for the Kiln incremental build engine.
//!
//! # Overview
//!
//! A build is a graph of **operators** (rules) connected through **marks**
//! (facts such as files or virtual targets). Each operator declares the
//! slots it reads and writes as a [`Schema`]; the executor crate wires
//! slots together, compiles the graph into a schedule and runs every
//! operator exactly once per run.
//!
//! # Key Components
//!
//! - **Types**: identities and the [`Freshness`] timestamp
//! - **Marks**: the [`Mark`] trait, [`MarkInfo`] and the shared freshness cache
//! - **Packs**: [`Schema`], [`Selector`], [`Storage`] and bound accessors
//! - **Traits**: the [`Operator`] contract, its [`Action`] and [`Outcome`]
//! - **Logging**: structured diagnostic events and collectors
//!
//! # Example
//!
//! ```ignore
//! use kiln_core::prelude::*;
//!
//! let products = Schema::builder().positional_count(1).named("out", 0).build()?;
//! let getter = products.getter(&Selector::named("out"))?;
//! let mut storage = products.allocate();
//! storage.put(0, Stamp::new("all").into_ref())?;
//! let mark = getter.get(&storage)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod logging;
pub mod mark;
pub mod pack;
pub mod prelude;
pub mod traits;
pub mod types;

pub use error::{KilnError, Result};
pub use mark::{Mark, MarkInfo, MarkInfoCache, MarkRef, Stamp};
pub use pack::{Getter, Schema, Selector, Setter, Storage};
pub use traits::{Action, Operator, OperatorInfo, Outcome};
pub use types::{EdgeId, EntityId, Freshness, ScheduleId, VertexId};
