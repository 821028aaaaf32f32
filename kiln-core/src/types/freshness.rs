//! Freshness timestamps and their lock-free high-water mark.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A monotonically comparable freshness indicator.
///
/// Stored as nanoseconds since the UNIX epoch. `Freshness::MIN` means
/// "never produced" and compares older than every real timestamp.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Freshness(u64);

impl Freshness {
    /// The oldest possible freshness.
    pub const MIN: Self = Self(0);

    /// Create a freshness from raw nanoseconds since the UNIX epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Freshness of the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert a system time; times before the epoch clamp to `MIN`.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let nanos = time
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self(nanos)
    }

    /// Raw nanoseconds since the UNIX epoch.
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Convert back into a system time.
    #[must_use]
    pub fn to_system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.0)
    }

    /// Whether this is the "never produced" value.
    #[must_use]
    pub const fn is_min(&self) -> bool {
        self.0 == 0
    }

    /// True if `self` is strictly later than `other`.
    #[must_use]
    pub fn is_after(&self, other: Freshness) -> bool {
        self.0 > other.0
    }
}

impl From<SystemTime> for Freshness {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_min() {
            return write!(f, "never");
        }
        let secs = (self.0 / 1_000_000_000) as i64;
        let nanos = (self.0 % 1_000_000_000) as u32;
        match chrono::DateTime::from_timestamp(secs, nanos) {
            Some(datetime) => write!(f, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.9fZ")),
            None => write!(f, "{}ns", self.0),
        }
    }
}

/// An atomically advanced freshness high-water mark.
///
/// `advance` is order independent: racing writers always leave the maximum
/// of every candidate they offered.
#[derive(Debug, Default)]
pub struct AtomicFreshness(AtomicU64);

impl AtomicFreshness {
    /// Create a high-water mark starting at `initial`.
    #[must_use]
    pub const fn new(initial: Freshness) -> Self {
        Self(AtomicU64::new(initial.0))
    }

    /// Load the current value.
    pub fn load(&self) -> Freshness {
        Freshness(self.0.load(Ordering::Acquire))
    }

    /// Advance to `max(current, candidate)` and return the new value.
    pub fn advance(&self, candidate: Freshness) -> Freshness {
        let prev = self.0.fetch_max(candidate.0, Ordering::AcqRel);
        Freshness(prev.max(candidate.0))
    }

    /// Overwrite the stored value.
    pub fn store(&self, value: Freshness) {
        self.0.store(value.0, Ordering::Release);
    }
}
