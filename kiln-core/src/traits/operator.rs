//! Operator trait and related types.

use super::action::Action;
use crate::error::KilnError;
use crate::pack::{Schema, Storage};
use crate::types::{EntityId, Freshness};

/// Metadata about an operator, used in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorInfo {
    /// Fully qualified name (e.g., "fs::file_exists").
    pub name: String,
    /// Namespace (e.g., "fs", "os").
    pub namespace: String,
    /// Short name (e.g., "file_exists").
    pub short_name: String,
    /// Description of what the rule does.
    pub description: String,
}

impl OperatorInfo {
    /// Create new operator info.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let short_name = name.into();
        let full_name = format!("{}::{}", namespace, short_name);

        Self {
            name: full_name,
            namespace,
            short_name,
            description: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

/// How an operator's single `apply` call ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Products were refreshed; they are now current as of the freshness.
    Updated(Freshness),
    /// No work was necessary; previously known product freshness stands.
    Skipped,
    /// The rule failed; dependents of this operator are not scheduled.
    Failed(KilnError),
}

impl Outcome {
    /// A failure from any error convertible into [`KilnError`].
    pub fn failed(err: impl Into<KilnError>) -> Self {
        Self::Failed(err.into())
    }

    /// Whether the outcome lets dependents proceed.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl From<crate::error::Result<Freshness>> for Outcome {
    fn from(result: crate::error::Result<Freshness>) -> Self {
        match result {
            Ok(freshness) => Self::Updated(freshness),
            Err(err) => Self::Failed(err),
        }
    }
}

/// A build rule.
///
/// An operator declares the slots it consumes (requisites) and produces
/// (products), and decides in [`apply`](Operator::apply) whether its
/// products need rebuilding. Operators are shared between runs and must
/// keep per-run state in the storage handed to them, never in `self`.
pub trait Operator: Send + Sync {
    /// Identity of this operator instance.
    fn id(&self) -> EntityId;

    /// Get operator metadata.
    fn info(&self) -> OperatorInfo;

    /// Template for the requisite slots. Called once per graph vertex.
    fn requisite_schema(&self) -> Schema;

    /// Template for the product slots. Called once per graph vertex.
    fn product_schema(&self) -> Schema;

    /// Run the rule once for this run.
    ///
    /// Called only after every requisite slot fed by the graph has been
    /// populated. Long-running work should poll
    /// [`Action::check_cancelled`] between steps.
    fn apply(&self, action: &Action<'_>, requisites: &Storage, products: &mut Storage) -> Outcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_names() {
        let info = OperatorInfo::new("fs", "file_exists").with_description("Probe a file");
        assert_eq!(info.name, "fs::file_exists");
        assert_eq!(info.short_name, "file_exists");
        assert_eq!(info.description, "Probe a file");
    }

    #[test]
    fn outcome_from_result() {
        let ok: Outcome = Ok(Freshness::from_nanos(4)).into();
        assert!(matches!(ok, Outcome::Updated(f) if f == Freshness::from_nanos(4)));

        let err: Outcome = Err(KilnError::Cancelled).into();
        assert!(!err.is_success());
        assert!(Outcome::Skipped.is_success());
    }
}
