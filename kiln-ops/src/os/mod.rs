//! Operating system rules.

mod exec;

pub use exec::{Exec, ExecBuilder};
