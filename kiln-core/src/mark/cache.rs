//! Cross-run cache of mark freshness.

use super::{Mark, MarkInfo};
use crate::error::Result;
use crate::types::EntityId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Concurrent map from mark identity to the latest known [`MarkInfo`].
///
/// Updates merge with "later freshness wins", applied under the entry's
/// shard lock, so independent operators discovering the same mark never
/// leave a stale record behind.
#[derive(Debug, Default)]
pub struct MarkInfoCache {
    infos: DashMap<EntityId, MarkInfo>,
}

impl MarkInfoCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached info for `mark`, probing and inserting it when absent.
    pub fn lookup(&self, mark: &dyn Mark) -> Result<MarkInfo> {
        if let Some(info) = self.infos.get(&mark.id()) {
            return Ok(*info);
        }
        self.refresh(mark)
    }

    /// Probe `mark` now and merge the result into the cache.
    pub fn refresh(&self, mark: &dyn Mark) -> Result<MarkInfo> {
        let probed = mark.probe()?;
        tracing::trace!(
            mark = %mark.id(),
            kind = mark.kind(),
            freshness = %probed.freshness,
            "Probed mark"
        );
        Ok(self.record(mark.id(), probed))
    }

    /// Probe `mark` now and replace the cached record with the result.
    ///
    /// Unlike [`refresh`](Self::refresh) the probe is authoritative: a fact
    /// that disappeared (a deleted file) goes back to its probed freshness.
    pub fn reprobe(&self, mark: &dyn Mark) -> Result<MarkInfo> {
        let probed = mark.probe()?;
        tracing::trace!(
            mark = %mark.id(),
            kind = mark.kind(),
            freshness = %probed.freshness,
            "Reprobed mark"
        );
        self.infos.insert(mark.id(), probed);
        Ok(probed)
    }

    /// Merge a known info record and return the surviving one.
    pub fn record(&self, id: EntityId, info: MarkInfo) -> MarkInfo {
        match self.infos.entry(id) {
            Entry::Occupied(mut entry) => {
                let merged = entry.get().merge(info);
                *entry.get_mut() = merged;
                merged
            }
            Entry::Vacant(entry) => *entry.insert(info),
        }
    }

    /// Info already known for `id`, without probing.
    pub fn known(&self, id: EntityId) -> Option<MarkInfo> {
        self.infos.get(&id).map(|info| *info)
    }

    /// Drop the record for `id`.
    pub fn forget(&self, id: EntityId) -> Option<MarkInfo> {
        self.infos.remove(&id).map(|(_, info)| info)
    }

    /// Number of cached marks.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Remove every record.
    pub fn clear(&self) {
        self.infos.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::Stamp;
    use crate::types::Freshness;
    use std::sync::Arc;

    #[test]
    fn lookup_probes_once() {
        let cache = MarkInfoCache::new();
        let stamp = Stamp::at("a", Freshness::from_nanos(10));
        assert_eq!(cache.lookup(&stamp).unwrap().freshness, Freshness::from_nanos(10));

        // A newer value of the same fact is not observed until refreshed.
        let newer = stamp.touched(Freshness::from_nanos(20));
        assert_eq!(cache.lookup(&newer).unwrap().freshness, Freshness::from_nanos(10));
        assert_eq!(cache.refresh(&newer).unwrap().freshness, Freshness::from_nanos(20));
    }

    #[test]
    fn reprobe_replaces_later_record() {
        let cache = MarkInfoCache::new();
        let stamp = Stamp::at("obj", Freshness::from_nanos(40));
        cache.record(stamp.id(), MarkInfo::new(Freshness::from_nanos(90)));

        assert_eq!(cache.refresh(&stamp).unwrap().freshness, Freshness::from_nanos(90));
        assert_eq!(cache.reprobe(&stamp).unwrap().freshness, Freshness::from_nanos(40));
        assert_eq!(
            cache.known(stamp.id()).map(|info| info.freshness),
            Some(Freshness::from_nanos(40))
        );
    }

    #[test]
    fn record_never_regresses() {
        let cache = MarkInfoCache::new();
        let id = EntityId::new();
        cache.record(id, MarkInfo::new(Freshness::from_nanos(30)));
        let kept = cache.record(id, MarkInfo::new(Freshness::from_nanos(5)));
        assert_eq!(kept.freshness, Freshness::from_nanos(30));
        assert_eq!(cache.known(id), Some(kept));
    }

    #[test]
    fn concurrent_records_keep_latest() {
        let cache = Arc::new(MarkInfoCache::new());
        let id = EntityId::new();
        std::thread::scope(|s| {
            for t in 0..8u64 {
                let cache = Arc::clone(&cache);
                s.spawn(move || {
                    for i in 0..500u64 {
                        cache.record(id, MarkInfo::new(Freshness::from_nanos(i * 8 + t)));
                    }
                });
            }
        });
        assert_eq!(
            cache.known(id).map(|info| info.freshness),
            Some(Freshness::from_nanos(499 * 8 + 7))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn forget_removes_entry() {
        let cache = MarkInfoCache::new();
        let stamp = Stamp::new("x");
        cache.lookup(&stamp).unwrap();
        assert!(cache.forget(stamp.id()).is_some());
        assert!(cache.is_empty());
    }
}
