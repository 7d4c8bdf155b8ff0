//! Last known-good snapshot plus the successful-cycle counter.

use common::Snapshot;

/// Owned by exactly one poller; only replaced after a fully successful cycle.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    snapshot: Option<Snapshot>,
    cycle: u64,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Number of successful cycles so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn has_baseline(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Swap in a new snapshot wholesale and bump the counter.
    pub fn replace(&mut self, snapshot: Snapshot) -> u64 {
        self.snapshot = Some(snapshot);
        self.cycle = self.cycle.saturating_add(1);
        self.cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_starts_without_baseline() {
        let cache = SnapshotCache::new();
        assert!(!cache.has_baseline());
        assert!(cache.snapshot().is_none());
        assert_eq!(cache.cycle(), 0);
    }

    #[test]
    fn test_replace_swaps_and_counts() {
        let mut cache = SnapshotCache::new();
        let first = Utc::now();
        let second = first + chrono::Duration::minutes(3);

        assert_eq!(cache.replace(Snapshot::new(vec![], vec![], first)), 1);
        assert_eq!(cache.replace(Snapshot::new(vec![], vec![], second)), 2);

        assert!(cache.has_baseline());
        assert_eq!(cache.snapshot().map(|s| s.captured_at), Some(second));
    }
}
