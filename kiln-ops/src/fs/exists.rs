//! Source file rule.

use crate::marks::FileNode;
use kiln_core::prelude::*;

/// Asserts that a source file exists and publishes it.
///
/// Has no requisites and a single product slot. The [`FileNode`] in that
/// slot is the one declared on the outgoing edge; the rule updates at the
/// file's modification time and fails if the file is missing.
#[derive(Debug)]
pub struct FileExists {
    id: EntityId,
}

impl FileExists {
    /// Create the rule.
    pub fn new() -> Self {
        Self { id: EntityId::new() }
    }
}

impl Default for FileExists {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for FileExists {
    fn id(&self) -> EntityId {
        self.id
    }

    fn info(&self) -> OperatorInfo {
        OperatorInfo::new("fs", "file_exists")
            .with_description("Publish an existing source file")
    }

    fn requisite_schema(&self) -> Schema {
        Schema::empty()
    }

    fn product_schema(&self) -> Schema {
        Schema::positional(1)
    }

    fn apply(&self, action: &Action<'_>, _requisites: &Storage, products: &mut Storage) -> Outcome {
        let result = products
            .get_as::<FileNode>(0)
            .and_then(|node| {
                let freshness = node.last_modified()?;
                action.log().debug(
                    LogCategory::Operator,
                    format!("Source {} present", node.path().display()),
                );
                Ok(freshness)
            });
        result.into()
    }
}
