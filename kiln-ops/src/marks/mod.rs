//! Standard marks.

mod array;
mod file;

pub use array::MarkArray;
pub use file::FileNode;
