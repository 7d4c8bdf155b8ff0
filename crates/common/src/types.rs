//! Record types scraped from the source page.
//!
//! Records carry no surrogate ids: two records are the same record iff every
//! field compares equal, recursively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

// ── Records ───────────────────────────────────────────────────────────

/// One statistics report posted under a tournament (e.g. "Combined").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatReport {
    pub name: String,
    pub link: Url,
}

/// A tournament listed in the recent-stats section with its reports.
///
/// Equality includes the full, order-sensitive report list, so a tournament
/// that gains a report compares unequal to its earlier self.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TournamentStats {
    pub tournament_name: String,
    pub tournament_link: Url,
    pub stat_reports: Vec<StatReport>,
}

/// A question set listed in the recently-posted-sets section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostedSet {
    pub name: String,
    pub link: Url,
}

// ── Snapshot ──────────────────────────────────────────────────────────

/// Everything visible on the source page at one fetch instant.
///
/// `stats` and `sets` keep document order (newest first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub stats: Vec<TournamentStats>,
    pub sets: Vec<PostedSet>,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        stats: Vec<TournamentStats>,
        sets: Vec<PostedSet>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stats,
            sets,
            captured_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty() && self.sets.is_empty()
    }

    /// Total number of tournament and set records.
    pub fn len(&self) -> usize {
        self.stats.len() + self.sets.len()
    }
}

// ── Notification kinds ────────────────────────────────────────────────

/// Which category of record a subscriber can opt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Stats,
    Sets,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Sets => "sets",
        }
    }
}
