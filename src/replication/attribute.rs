//! Versioned attribute holders
//!
//! `ReplicatedAttribute` lives on the authority and is the only place a
//! replicated value can be written. `MirroredAttribute` lives on observers and
//! only accepts deliveries, never local writes.

/// Per-attribute version counter. Version 0 is the spawn snapshot.
pub type Version = u64;

/// Authoritative value with change tracking
///
/// Every distinct `set` bumps the version and marks the attribute dirty.
/// `take_dirty` hands out only the latest value, so several sets between two
/// collections coalesce into one delivery.
#[derive(Debug, Clone)]
pub struct ReplicatedAttribute<T> {
    value: T,
    version: Version,
    dirty: bool,
}

impl<T: Clone + PartialEq> ReplicatedAttribute<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            version: 0,
            dirty: false,
        }
    }

    /// Store a new value. Returns false (and schedules nothing) when the value
    /// is unchanged.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.version += 1;
        self.dirty = true;
        true
    }

    #[inline]
    pub fn get(&self) -> &T {
        &self.value
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Current value and version regardless of dirtiness (spawn snapshots)
    pub fn snapshot(&self) -> (Version, T) {
        (self.version, self.value.clone())
    }

    /// Latest value if it changed since the last collection
    pub fn take_dirty(&mut self) -> Option<(Version, T)> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.snapshot())
    }
}

/// Observer-side copy of a replicated value
///
/// Deliveries are applied only when strictly newer than the last applied
/// version, so an observer never regresses to an older value and duplicate
/// deliveries never re-trigger notifications.
#[derive(Debug, Clone)]
pub struct MirroredAttribute<T> {
    value: T,
    version: Version,
}

impl<T> MirroredAttribute<T> {
    /// Initialise from a spawn snapshot
    pub fn new(version: Version, value: T) -> Self {
        Self { value, version }
    }

    /// Apply a delivery. Returns the new value when it was accepted, `None`
    /// when it was stale or a duplicate.
    pub fn receive(&mut self, version: Version, value: T) -> Option<&T> {
        if version <= self.version {
            return None;
        }
        self.version = version;
        self.value = value;
        Some(&self.value)
    }

    #[inline]
    pub fn get(&self) -> &T {
        &self.value
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_clean() {
        let attr = ReplicatedAttribute::new(30u32);
        assert_eq!(*attr.get(), 30);
        assert_eq!(attr.version(), 0);
        assert!(!attr.is_dirty());
    }

    #[test]
    fn test_set_bumps_version() {
        let mut attr = ReplicatedAttribute::new(30u32);
        assert!(attr.set(29));
        assert_eq!(attr.version(), 1);
        assert!(attr.is_dirty());
    }

    #[test]
    fn test_set_same_value_is_noop() {
        let mut attr = ReplicatedAttribute::new(30u32);
        assert!(!attr.set(30));
        assert_eq!(attr.version(), 0);
        assert!(attr.take_dirty().is_none());
    }

    #[test]
    fn test_take_dirty_coalesces() {
        let mut attr = ReplicatedAttribute::new(30u32);
        attr.set(29);
        attr.set(28);
        attr.set(27);

        assert_eq!(attr.take_dirty(), Some((3, 27)));
        assert!(attr.take_dirty().is_none());
    }

    #[test]
    fn test_mirror_accepts_newer() {
        let mut mirror = MirroredAttribute::new(0, 30u32);
        assert_eq!(mirror.receive(2, 28), Some(&28));
        assert_eq!(*mirror.get(), 28);
        assert_eq!(mirror.version(), 2);
    }

    #[test]
    fn test_mirror_rejects_stale_and_duplicate() {
        let mut mirror = MirroredAttribute::new(0, 30u32);
        mirror.receive(5, 25);

        assert!(mirror.receive(3, 27).is_none());
        assert!(mirror.receive(5, 25).is_none());
        assert_eq!(*mirror.get(), 25);
    }

    #[test]
    fn test_mirror_tolerates_skipped_versions() {
        let mut mirror = MirroredAttribute::new(0, 30u32);
        // 1..=9 coalesced away by the link
        assert_eq!(mirror.receive(10, 20), Some(&20));
    }
}
