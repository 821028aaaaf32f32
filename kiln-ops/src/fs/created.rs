//! Artifact check rule.

use crate::marks::FileNode;
use kiln_core::prelude::*;

/// Checks that the file produced upstream was actually created.
///
/// Consumes one [`FileNode`] and produces nothing. Typically the last rule
/// downstream of whatever writes the file.
#[derive(Debug)]
pub struct FileCreated {
    id: EntityId,
}

impl FileCreated {
    /// Create the rule.
    pub fn new() -> Self {
        Self { id: EntityId::new() }
    }
}

impl Default for FileCreated {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for FileCreated {
    fn id(&self) -> EntityId {
        self.id
    }

    fn info(&self) -> OperatorInfo {
        OperatorInfo::new("fs", "file_created")
            .with_description("Check that an artifact was written")
    }

    fn requisite_schema(&self) -> Schema {
        Schema::positional(1)
    }

    fn product_schema(&self) -> Schema {
        Schema::empty()
    }

    fn apply(&self, _action: &Action<'_>, requisites: &Storage, _products: &mut Storage) -> Outcome {
        requisites
            .get_as::<FileNode>(0)
            .and_then(FileNode::last_modified)
            .into()
    }
}
