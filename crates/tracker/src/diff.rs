//! Snapshot diffing.
//!
//! A record is new when no structurally equal record exists in the previous
//! snapshot. Tournaments compare on their whole report list, so a tournament
//! that gains a report shows up again as a new record.

use std::collections::HashSet;

use common::{PostedSet, Snapshot, TournamentStats};

/// Result of comparing a fresh snapshot against the cached one.
#[derive(Debug, Clone)]
pub enum DiffOutcome {
    /// Nothing cached yet; the current snapshot becomes the baseline.
    NoBaseline,
    /// Records present now but absent before, in current page order.
    Delta(Snapshot),
}

impl DiffOutcome {
    pub fn is_baseline(&self) -> bool {
        matches!(self, DiffOutcome::NoBaseline)
    }
}

/// Compute the delta between `previous` and `current` without touching either.
pub fn new_items(previous: Option<&Snapshot>, current: &Snapshot) -> DiffOutcome {
    let Some(previous) = previous else {
        return DiffOutcome::NoBaseline;
    };

    let seen_stats: HashSet<&TournamentStats> = previous.stats.iter().collect();
    let seen_sets: HashSet<&PostedSet> = previous.sets.iter().collect();

    let stats = current
        .stats
        .iter()
        .filter(|t| !seen_stats.contains(t))
        .cloned()
        .collect();
    let sets = current
        .sets
        .iter()
        .filter(|s| !seen_sets.contains(s))
        .cloned()
        .collect();

    DiffOutcome::Delta(Snapshot::new(stats, sets, current.captured_at))
}
