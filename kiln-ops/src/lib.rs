//! Standard marks and operators for Kiln.
//!
//! ## Marks (`marks::*`)
//! - [`marks::FileNode`] - a filesystem path, fresh as of its mtime
//! - [`marks::MarkArray`] - a fixed group of marks, fresh as of its freshest member
//!
//! ## Filesystem rules (`fs::*`)
//! - [`fs::FileExists`] - publishes a source file that must already exist
//! - [`fs::FileCreated`] - checks an artifact was written by its producers
//!
//! ## Process rules (`os::*`)
//! - [`os::Exec`] - runs a program over its requisite and product files

#![warn(missing_docs)]

pub mod fs;
pub mod marks;
pub mod os;

pub use fs::{FileCreated, FileExists};
pub use marks::{FileNode, MarkArray};
pub use os::{Exec, ExecBuilder};

/// Prelude for commonly used types.
pub mod prelude {
    pub use crate::fs::{FileCreated, FileExists};
    pub use crate::marks::{FileNode, MarkArray};
    pub use crate::os::{Exec, ExecBuilder};
}
