//! Slot layouts and selector resolution.

use super::storage::Storage;
use crate::error::{KilnError, Result};
use crate::mark::MarkRef;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Names a slot of a schema, by alias or by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// A slot selected by its name alias.
    Named(String),
    /// A slot selected by position.
    Positional(usize),
}

impl Selector {
    /// Select a slot by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Select a slot by position.
    pub const fn positional(position: usize) -> Self {
        Self::Positional(position)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "'{}'", name),
            Self::Positional(pos) => write!(f, "#{}", pos),
        }
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<usize> for Selector {
    fn from(position: usize) -> Self {
        Self::positional(position)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Layout {
    pub(crate) len: usize,
    pub(crate) names: HashMap<String, usize>,
    pub(crate) aliases: Vec<Option<String>>,
}

impl Layout {
    pub(crate) fn position_of(&self, name: &str) -> Result<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| KilnError::UnknownSlotName {
                name: name.to_string(),
            })
    }

    pub(crate) fn check(&self, position: usize) -> Result<usize> {
        if position < self.len {
            Ok(position)
        } else {
            Err(KilnError::SlotOutOfRange {
                position,
                len: self.len,
            })
        }
    }
}

/// An immutable template of mark slots.
///
/// A schema is declared once per operator vertex and allocated into fresh
/// [`Storage`] for every run, so runs never share slot contents. Cloning a
/// schema is cheap; clones share the same layout.
#[derive(Debug, Clone)]
pub struct Schema {
    layout: Arc<Layout>,
}

impl Schema {
    /// A schema with no slots.
    pub fn empty() -> Self {
        Self {
            layout: Arc::new(Layout::default()),
        }
    }

    /// A schema of `count` unnamed slots.
    pub fn positional(count: usize) -> Self {
        Self {
            layout: Arc::new(Layout {
                len: count,
                aliases: vec![None; count],
                ..Layout::default()
            }),
        }
    }

    /// Declare a schema of `positional_count` slots with `(name, position)`
    /// aliases.
    pub fn declare<I, S>(positional_count: usize, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut builder = Self::builder().positional_count(positional_count);
        for (name, position) in names {
            builder = builder.named(name, position);
        }
        builder.build()
    }

    /// Start building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.layout.len
    }

    /// Whether the schema has no slots.
    pub fn is_empty(&self) -> bool {
        self.layout.len == 0
    }

    /// Name alias of a slot, if any.
    pub fn name_of(&self, position: usize) -> Option<&str> {
        self.layout
            .aliases
            .get(position)
            .and_then(|alias| alias.as_deref())
    }

    /// Allocate fresh, empty storage for one run.
    pub fn allocate(&self) -> Storage {
        Storage::new(Arc::clone(&self.layout))
    }

    /// Resolve a selector to a slot position.
    pub fn resolve(&self, selector: &Selector) -> Result<usize> {
        match selector {
            Selector::Named(name) => self.layout.position_of(name),
            Selector::Positional(position) => self.layout.check(*position),
        }
    }

    /// Bind a selector to a reading accessor over this schema's storage.
    pub fn getter(&self, selector: &Selector) -> Result<Getter> {
        self.resolve(selector).map(|position| Getter { position })
    }

    /// Bind a selector to a writing accessor over this schema's storage.
    pub fn setter(&self, selector: &Selector) -> Result<Setter> {
        self.resolve(selector).map(|position| Setter { position })
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    positional_count: usize,
    named: Vec<(String, usize)>,
}

impl SchemaBuilder {
    /// Set the number of slots.
    pub fn positional_count(mut self, count: usize) -> Self {
        self.positional_count = count;
        self
    }

    /// Alias slot `position` as `name`.
    pub fn named(mut self, name: impl Into<String>, position: usize) -> Self {
        self.named.push((name.into(), position));
        self
    }

    /// Build the schema, validating the aliases.
    pub fn build(self) -> Result<Schema> {
        let mut layout = Layout {
            len: self.positional_count,
            names: HashMap::with_capacity(self.named.len()),
            aliases: vec![None; self.positional_count],
        };

        for (name, position) in self.named {
            layout.check(position)?;
            if layout.names.contains_key(&name) || layout.aliases[position].is_some() {
                return Err(KilnError::DuplicateSlotName { name, position });
            }
            layout.aliases[position] = Some(name.clone());
            layout.names.insert(name, position);
        }

        Ok(Schema {
            layout: Arc::new(layout),
        })
    }
}

/// Reads one slot of a producer's product storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Getter {
    position: usize,
}

impl Getter {
    /// Slot position this getter reads.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Read the mark from `storage`.
    pub fn get(&self, storage: &Storage) -> Result<MarkRef> {
        storage.get(self.position).cloned()
    }
}

/// Writes one slot of a consumer's requisite storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setter {
    position: usize,
}

impl Setter {
    /// Slot position this setter writes.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Write `mark` into `storage`.
    pub fn set(&self, storage: &mut Storage, mark: MarkRef) -> Result<()> {
        storage.put(self.position, mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::Stamp;

    fn compile_schema() -> Schema {
        Schema::builder()
            .positional_count(3)
            .named("src", 0)
            .named("flags", 2)
            .build()
            .unwrap()
    }

    #[test]
    fn resolve_by_name_and_position() {
        let schema = compile_schema();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.resolve(&Selector::named("src")).unwrap(), 0);
        assert_eq!(schema.resolve(&Selector::named("flags")).unwrap(), 2);
        assert_eq!(schema.resolve(&Selector::positional(1)).unwrap(), 1);
        assert_eq!(schema.name_of(2), Some("flags"));
        assert_eq!(schema.name_of(1), None);
    }

    #[test]
    fn positional_has_no_names() {
        let schema = Schema::positional(2);
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.name_of(0), None);
        assert!(schema.resolve(&Selector::positional(2)).is_err());
        assert_eq!(schema.allocate().populated(), 0);
    }

    #[test]
    fn unknown_name_fails_at_bind_time() {
        let schema = compile_schema();
        let err = schema.getter(&Selector::named("missing")).unwrap_err();
        assert!(matches!(err, KilnError::UnknownSlotName { ref name } if name == "missing"));
    }

    #[test]
    fn out_of_range_position_fails() {
        let schema = compile_schema();
        let err = schema.setter(&Selector::positional(3)).unwrap_err();
        assert!(matches!(
            err,
            KilnError::SlotOutOfRange {
                position: 3,
                len: 3
            }
        ));
        assert!(Schema::empty().resolve(&Selector::positional(0)).is_err());
    }

    #[test]
    fn duplicate_names_rejected() {
        let dup = Schema::declare(2, [("a", 0), ("a", 1)]);
        assert!(matches!(dup, Err(KilnError::DuplicateSlotName { .. })));

        let twice = Schema::declare(2, [("a", 0), ("b", 0)]);
        assert!(matches!(twice, Err(KilnError::DuplicateSlotName { .. })));

        let outside = Schema::declare(1, [("a", 4)]);
        assert!(matches!(outside, Err(KilnError::SlotOutOfRange { .. })));
    }

    #[test]
    fn bound_accessors_move_marks() {
        let schema = compile_schema();
        let getter = schema.getter(&Selector::named("flags")).unwrap();
        let setter = schema.setter(&Selector::named("flags")).unwrap();

        let mut storage = schema.allocate();
        assert!(matches!(
            getter.get(&storage),
            Err(KilnError::EmptySlot { position: 2 })
        ));

        let mark = Stamp::new("cflags").into_ref();
        setter.set(&mut storage, Arc::clone(&mark)).unwrap();
        assert_eq!(getter.get(&storage).unwrap().id(), mark.id());
    }

    #[test]
    fn allocations_are_independent() {
        let schema = compile_schema();
        let mut first = schema.allocate();
        let second = schema.allocate();
        first.put(0, Stamp::new("a").into_ref()).unwrap();
        assert!(first.is_populated(0));
        assert!(!second.is_populated(0));
    }
}
