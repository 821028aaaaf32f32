//! Per-run slot contents.

use super::schema::Layout;
use crate::error::{KilnError, Result};
use crate::mark::{Mark, MarkRef};
use std::fmt;
use std::sync::Arc;

/// One concrete instance of a schema's slots.
///
/// Storage is allocated from a [`Schema`](super::Schema) and owned by a
/// single scheduling item for the duration of one run.
#[derive(Clone)]
pub struct Storage {
    layout: Arc<Layout>,
    slots: Vec<Option<MarkRef>>,
}

impl Storage {
    pub(crate) fn new(layout: Arc<Layout>) -> Self {
        let slots = vec![None; layout.len];
        Self { layout, slots }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the storage has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Read the mark at `position`.
    pub fn get(&self, position: usize) -> Result<&MarkRef> {
        self.layout.check(position)?;
        self.slots[position]
            .as_ref()
            .ok_or(KilnError::EmptySlot { position })
    }

    /// Read the mark in the slot aliased `name`.
    pub fn get_named(&self, name: &str) -> Result<&MarkRef> {
        let position = self.layout.position_of(name)?;
        self.get(position)
    }

    /// Read the mark at `position` as concrete kind `M`.
    pub fn get_as<M: Mark>(&self, position: usize) -> Result<&M> {
        let mark = self.get(position)?;
        mark.downcast_ref::<M>()
            .ok_or_else(|| KilnError::MarkKindMismatch {
                position,
                expected: std::any::type_name::<M>(),
                actual: mark.kind(),
            })
    }

    /// Write `mark` into `position`, replacing any previous value.
    pub fn put(&mut self, position: usize, mark: MarkRef) -> Result<()> {
        self.layout.check(position)?;
        self.slots[position] = Some(mark);
        Ok(())
    }

    /// Write `mark` into the slot aliased `name`.
    pub fn put_named(&mut self, name: &str, mark: MarkRef) -> Result<()> {
        let position = self.layout.position_of(name)?;
        self.put(position, mark)
    }

    /// Clear the slot at `position`, returning its previous value.
    pub fn take(&mut self, position: usize) -> Result<Option<MarkRef>> {
        self.layout.check(position)?;
        Ok(self.slots[position].take())
    }

    /// Whether a mark has been written at `position`.
    pub fn is_populated(&self, position: usize) -> bool {
        self.slots.get(position).is_some_and(Option::is_some)
    }

    /// Number of populated slots.
    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterate over populated slots as `(position, mark)`.
    pub fn marks(&self) -> impl Iterator<Item = (usize, &MarkRef)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| slot.as_ref().map(|mark| (position, mark)))
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (position, slot) in self.slots.iter().enumerate() {
            match (&self.layout.aliases[position], slot) {
                (Some(name), Some(mark)) => list.entry(&format_args!("{}={:?}", name, mark)),
                (Some(name), None) => list.entry(&format_args!("{}=<empty>", name)),
                (None, Some(mark)) => list.entry(mark),
                (None, None) => list.entry(&format_args!("<empty>")),
            };
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::KilnError;
    use crate::mark::{Mark, Stamp};
    use crate::pack::Schema;
    use crate::types::Freshness;

    #[derive(Debug)]
    struct Other;

    impl Mark for Other {
        fn id(&self) -> crate::types::EntityId {
            crate::types::EntityId::new()
        }

        fn kind(&self) -> &'static str {
            "other"
        }

        fn probe(&self) -> crate::error::Result<crate::mark::MarkInfo> {
            Ok(Default::default())
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn named_access() {
        let schema = Schema::declare(2, [("out", 1)]).unwrap();
        let mut storage = schema.allocate();
        storage
            .put_named("out", Stamp::at("o", Freshness::from_nanos(1)).into_ref())
            .unwrap();
        assert_eq!(storage.populated(), 1);
        assert_eq!(storage.get(1).unwrap().kind(), "stamp");
        assert!(storage.get_named("in").is_err());
        assert_eq!(storage.marks().map(|(pos, _)| pos).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn typed_access_checks_kind() {
        let schema = Schema::declare(2, Vec::<(String, usize)>::new()).unwrap();
        let mut storage = schema.allocate();
        storage.put(0, Stamp::new("s").into_ref()).unwrap();
        storage.put(1, std::sync::Arc::new(Other)).unwrap();

        assert_eq!(storage.get_as::<Stamp>(0).unwrap().name(), "s");
        let err = storage.get_as::<Stamp>(1).unwrap_err();
        assert!(matches!(err, KilnError::MarkKindMismatch { actual: "other", .. }));
    }

    #[test]
    fn take_empties_slot() {
        let schema = Schema::declare(1, [("x", 0)]).unwrap();
        let mut storage = schema.allocate();
        storage.put(0, Stamp::new("x").into_ref()).unwrap();
        assert!(storage.take(0).unwrap().is_some());
        assert!(!storage.is_populated(0));
        assert!(matches!(storage.take(5), Err(KilnError::SlotOutOfRange { .. })));
    }
}
