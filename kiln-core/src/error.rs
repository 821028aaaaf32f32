//! Error types for Kiln.
//!
//! Errors are grouped by code range so a log line identifies the failing
//! layer at a glance. Schema errors are programmer errors raised while a
//! graph is declared; operator errors surface while a schedule runs.

use crate::types::{EntityId, VertexId};
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Kiln operations.
#[derive(Error, Debug, Clone)]
pub enum KilnError {
    // =========================================================================
    // Schema Errors (E100-E199)
    // =========================================================================
    /// A selector named a slot the schema does not declare.
    #[error("E101: Unknown slot name '{name}'")]
    UnknownSlotName {
        /// The unresolved slot name.
        name: String,
    },

    /// A positional selector fell outside the schema.
    #[error("E102: Slot position {position} out of range for schema of {len} slots")]
    SlotOutOfRange {
        /// The requested position.
        position: usize,
        /// Number of slots in the schema.
        len: usize,
    },

    /// A slot was read before anything was written into it.
    #[error("E103: Slot {position} has not been populated")]
    EmptySlot {
        /// The slot position.
        position: usize,
    },

    /// A schema declared the same name twice, or two names for one slot.
    #[error("E104: Duplicate slot name '{name}' at position {position}")]
    DuplicateSlotName {
        /// The conflicting name.
        name: String,
        /// The slot it was declared on.
        position: usize,
    },

    /// A slot is already bound to a different edge or mark.
    #[error("E105: Slot {position} of {vertex} is already bound to {existing}")]
    SlotAlreadyBound {
        /// The vertex owning the slot.
        vertex: VertexId,
        /// The slot position.
        position: usize,
        /// Identity of the mark already bound there.
        existing: EntityId,
    },

    /// A slot held a mark of a different concrete kind than requested.
    #[error("E106: Slot {position} holds a '{actual}' mark, expected '{expected}'")]
    MarkKindMismatch {
        /// The slot position.
        position: usize,
        /// The requested mark type.
        expected: &'static str,
        /// The kind of the stored mark.
        actual: &'static str,
    },

    // =========================================================================
    // Graph Errors (E200-E299)
    // =========================================================================
    /// Compilation was refused because the graph contains cycles.
    #[error("E201: Graph contains {cycles} cycle(s) and cannot be compiled")]
    CyclicGraph {
        /// Number of cycles found.
        cycles: usize,
    },

    /// A vertex ID does not belong to the graph or schedule.
    #[error("E202: Unknown vertex {vertex}")]
    UnknownVertex {
        /// The missing vertex.
        vertex: VertexId,
    },

    // =========================================================================
    // Operator Errors (E300-E399)
    // =========================================================================
    /// An operator reported failure.
    #[error("E301: Operator '{operator}' failed: {cause}")]
    OperatorFailed {
        /// Name of the failing operator.
        operator: String,
        /// Reason for the failure.
        cause: String,
    },

    /// An operator panicked while applying.
    #[error("E302: Operator '{operator}' panicked: {message}")]
    OperatorPanic {
        /// Name of the panicking operator.
        operator: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// Work stopped because the run was aborted.
    #[error("E303: Run was aborted")]
    Cancelled,

    // =========================================================================
    // Mark Errors (E400-E499)
    // =========================================================================
    /// Probing a mark's freshness failed.
    #[error("E401: Failed to probe mark '{mark}': {cause}")]
    MarkProbe {
        /// Description of the mark.
        mark: String,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Runtime Errors (E500-E599)
    // =========================================================================
    /// The worker pool could not be created.
    #[error("E501: Failed to start worker pool: {cause}")]
    Runtime {
        /// Reason for the failure.
        cause: String,
    },

    /// A filesystem operation failed.
    #[error("E502: I/O error at {path}: {cause}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },
}

impl KilnError {
    /// Build an operator failure from any displayable cause.
    pub fn operator(operator: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperatorFailed {
            operator: operator.into(),
            cause: cause.to_string(),
        }
    }

    /// Build an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            cause: err.to_string(),
        }
    }

    /// Whether this error is a build-time schema error.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSlotName { .. }
                | Self::SlotOutOfRange { .. }
                | Self::EmptySlot { .. }
                | Self::DuplicateSlotName { .. }
                | Self::SlotAlreadyBound { .. }
                | Self::MarkKindMismatch { .. }
        )
    }
}

/// Result type alias for Kiln operations.
pub type Result<T> = std::result::Result<T, KilnError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    /// Wrap an error as a failure of the named operator.
    fn for_operator(self, operator: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn for_operator(self, operator: &str) -> Result<T> {
        self.map_err(|e| KilnError::operator(operator, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_in_messages() {
        let err = KilnError::UnknownSlotName {
            name: "src".to_string(),
        };
        assert_eq!(err.to_string(), "E101: Unknown slot name 'src'");
        assert!(err.is_schema_error());

        let err = KilnError::CyclicGraph { cycles: 2 };
        assert!(err.to_string().starts_with("E201"));
        assert!(!err.is_schema_error());
    }

    #[test]
    fn result_ext_wraps_cause() {
        let res: std::result::Result<(), &str> = Err("exit status 1");
        let err = res.for_operator("os::exec").unwrap_err();
        assert_eq!(
            err.to_string(),
            "E301: Operator 'os::exec' failed: exit status 1"
        );
    }
}
