//! Filesystem rules.

mod created;
mod exists;

pub use created::FileCreated;
pub use exists::FileExists;
