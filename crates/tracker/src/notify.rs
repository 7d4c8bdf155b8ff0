//! Hand-off point for newly found records.

use async_trait::async_trait;
use common::{PostedSet, Result, Snapshot, TournamentStats};

/// Records found by one cycle, tagged with the cycle that found them.
#[derive(Debug, Clone)]
pub struct NewItems {
    pub stats: Vec<TournamentStats>,
    pub sets: Vec<PostedSet>,
    pub cycle: u64,
}

impl NewItems {
    pub fn from_delta(delta: Snapshot, cycle: u64) -> Self {
        Self {
            stats: delta.stats,
            sets: delta.sets,
            cycle,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty() && self.sets.is_empty()
    }
}

/// Receives non-empty deltas once a baseline exists.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, items: &NewItems) -> Result<()>;
}
