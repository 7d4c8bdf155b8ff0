//! Change tracking for the source page.
//!
//! Holds the last good snapshot, diffs each new poll against it, and drives
//! the fetch → parse → diff → update cycle on a fixed interval.

pub mod cache;
pub mod diff;
pub mod lifecycle;
pub mod notify;
pub mod poller;

pub use cache::SnapshotCache;
pub use diff::{new_items, DiffOutcome};
pub use lifecycle::PollerLifecycle;
pub use notify::{NewItems, Notifier};
pub use poller::{CycleOutcome, PollState, PollStatus, Poller};
