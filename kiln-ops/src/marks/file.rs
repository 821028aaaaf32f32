//! Filesystem node mark.

use kiln_core::{EntityId, Freshness, KilnError, Mark, MarkInfo, MarkRef, Result};
use std::any::Any;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A file or directory, fresh as of its last modification.
///
/// A path that does not exist probes as [`Freshness::MIN`]: the artifact
/// has never been produced.
#[derive(Debug, Clone)]
pub struct FileNode {
    id: EntityId,
    path: PathBuf,
}

impl FileNode {
    /// Track the node at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: EntityId::new(),
            path: path.into(),
        }
    }

    /// Path of the node.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the node currently exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Modification time of the node, failing if it does not exist.
    pub fn last_modified(&self) -> Result<Freshness> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|err| self.probe_error(&err))?;
        Ok(Freshness::from_system_time(modified))
    }

    /// Wrap into a shared mark handle.
    pub fn into_ref(self) -> MarkRef {
        Arc::new(self)
    }

    fn probe_error(&self, err: &io::Error) -> KilnError {
        KilnError::MarkProbe {
            mark: self.path.display().to_string(),
            cause: err.to_string(),
        }
    }
}

impl Mark for FileNode {
    fn id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    fn probe(&self) -> Result<MarkInfo> {
        match self.last_modified() {
            Ok(freshness) => Ok(MarkInfo::new(freshness)),
            Err(_) if !self.path.exists() => Ok(MarkInfo::new(Freshness::MIN)),
            Err(err) => Err(err),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
