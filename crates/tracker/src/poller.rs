//! The poll loop.
//!
//! One cycle walks `Idle → Fetching → Parsing → Diffing → Updating → Idle`.
//! A failure in any step drops to `Failed` and back to `Idle` without
//! touching the cache, so the next tick diffs against the last good snapshot.
//! Cycles never overlap: `run` awaits each one before waiting for the next tick.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::config::TimingConfig;
use common::{Error, Result};
use hsqb_client::{PageParser, PageSource};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::cache::SnapshotCache;
use crate::diff::{new_items, DiffOutcome};
use crate::notify::{NewItems, Notifier};

/// Where the poller is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Parsing,
    Diffing,
    Updating,
    Failed,
}

/// What a single cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// First good snapshot; stored, nothing reported.
    Baseline { cycle: u64, records: usize },
    /// Snapshot stored, nothing new on the page.
    NoChanges { cycle: u64 },
    /// Snapshot stored and the new records were handed to the notifier.
    NewItems(NewItems),
    /// Cycle aborted; cache untouched.
    Failed { error: Error },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CycleOutcome::Failed { .. })
    }
}

/// Operational status published after every cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollStatus {
    /// Successful cycles so far.
    pub cycle: u64,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle {}", self.cycle)?;
        if self.consecutive_failures > 0 {
            write!(f, " ({} failing)", self.consecutive_failures)?;
        }
        Ok(())
    }
}

/// Owns the cache and every collaborator a cycle needs.
pub struct Poller {
    source: Arc<dyn PageSource>,
    parser: PageParser,
    notifier: Arc<dyn Notifier>,
    cache: SnapshotCache,
    state: PollState,
    interval: Duration,
    fetch_timeout: Duration,
    status: PollStatus,
    status_tx: watch::Sender<PollStatus>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn PageSource>,
        parser: PageParser,
        notifier: Arc<dyn Notifier>,
        timing: &TimingConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(PollStatus::default());
        Self {
            source,
            parser,
            notifier,
            cache: SnapshotCache::new(),
            state: PollState::Idle,
            interval: Duration::from_secs(timing.poll_interval_secs),
            fetch_timeout: Duration::from_secs(timing.fetch_timeout_secs),
            status: PollStatus::default(),
            status_tx,
        }
    }

    /// Subscribe to the status published after each cycle.
    pub fn status_receiver(&self) -> watch::Receiver<PollStatus> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Run one full cycle. Never returns an error: failures are logged,
    /// published in the status, and reported as [`CycleOutcome::Failed`].
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = match self.try_cycle().await {
            Ok(outcome) => {
                self.status.cycle = self.cache.cycle();
                self.status.consecutive_failures = 0;
                self.status.last_success_at = self.cache.snapshot().map(|s| s.captured_at);
                self.status.last_error = None;
                outcome
            }
            Err(error) => {
                self.transition(PollState::Failed);
                self.status.consecutive_failures =
                    self.status.consecutive_failures.saturating_add(1);
                self.status.last_error = Some(error.to_string());
                if error.is_cycle_local() {
                    warn!(
                        "Cycle failed ({} in a row) from {}: {}",
                        self.status.consecutive_failures,
                        self.source.describe(),
                        error
                    );
                } else {
                    error!("Unexpected {} error during cycle: {}", error.kind(), error);
                }
                CycleOutcome::Failed { error }
            }
        };

        self.transition(PollState::Idle);
        self.status_tx.send_replace(self.status.clone());
        outcome
    }

    async fn try_cycle(&mut self) -> Result<CycleOutcome> {
        self.transition(PollState::Fetching);
        let page = tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .map_err(|_| {
                Error::Fetch(format!(
                    "{} did not respond within {}s",
                    self.source.describe(),
                    self.fetch_timeout.as_secs()
                ))
            })??;

        self.transition(PollState::Parsing);
        let snapshot = self.parser.parse(&page.body, page.fetched_at)?;

        self.transition(PollState::Diffing);
        let diff = new_items(self.cache.snapshot(), &snapshot);

        self.transition(PollState::Updating);
        let records = snapshot.len();
        let cycle = self.cache.replace(snapshot);

        let delta = match diff {
            DiffOutcome::NoBaseline => {
                info!("Cycle {}: baseline established with {} records", cycle, records);
                return Ok(CycleOutcome::Baseline { cycle, records });
            }
            DiffOutcome::Delta(delta) if delta.is_empty() => {
                info!("Cycle {}: no new items ({} records on page)", cycle, records);
                return Ok(CycleOutcome::NoChanges { cycle });
            }
            DiffOutcome::Delta(delta) => delta,
        };

        let items = NewItems::from_delta(delta, cycle);
        info!(
            "Cycle {}: {} new stats, {} new sets",
            cycle,
            items.stats.len(),
            items.sets.len()
        );
        if let Err(e) = self.notifier.notify(&items).await {
            warn!("Notifier failed for cycle {}: {}", cycle, e);
        }

        Ok(CycleOutcome::NewItems(items))
    }

    /// Poll on the configured interval until `stop` flips to `true`.
    ///
    /// The stop signal is only honoured between cycles. Returns the cache so
    /// callers can inspect the final state.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> SnapshotCache {
        info!(
            "Polling {} every {}s",
            self.source.describe(),
            self.interval.as_secs()
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *stop.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            self.run_cycle().await;
        }

        info!("Poll loop stopped after {} successful cycles", self.cache.cycle());
        self.cache
    }

    fn transition(&mut self, next: PollState) {
        debug!("poll state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::config::SourceConfig;
    use hsqb_client::FetchedPage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Tournament<'a> = (&'a str, &'a [&'a str]);

    fn page(tournaments: &[Tournament<'_>], sets: &[&str]) -> String {
        let stats: String = tournaments
            .iter()
            .map(|(name, reports)| {
                let items: String = reports
                    .iter()
                    .map(|r| format!(r#"<li><a href="/db/t/{}/{}/">{}</a></li>"#, name, r, r))
                    .collect();
                format!(r#"<li><a href="/db/t/{}/">{}</a><ul>{}</ul></li>"#, name, name, items)
            })
            .collect();
        let sets: String = sets
            .iter()
            .map(|s| format!(r#"<li><a href="/db/s/{}/">{}</a></li>"#, s, s))
            .collect();
        format!(
            r#"<html><body><div id="recent-stats"><ul>{}</ul></div><div id="recent-sets"><ul>{}</ul></div></body></html>"#,
            stats, sets
        )
    }

    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<String>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into()),
            })
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch(&self) -> Result<FetchedPage> {
            let next = self
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Fetch("script exhausted".into())));
            next.map(|body| FetchedPage {
                body,
                fetched_at: Utc::now(),
            })
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    /// Returns the same page forever.
    struct StaticSource(String);

    #[async_trait]
    impl PageSource for StaticSource {
        async fn fetch(&self) -> Result<FetchedPage> {
            Ok(FetchedPage {
                body: self.0.clone(),
                fetched_at: Utc::now(),
            })
        }

        fn describe(&self) -> String {
            "static".into()
        }
    }

    /// Answers after ten seconds.
    struct SlowSource(String);

    #[async_trait]
    impl PageSource for SlowSource {
        async fn fetch(&self) -> Result<FetchedPage> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(FetchedPage {
                body: self.0.clone(),
                fetched_at: Utc::now(),
            })
        }

        fn describe(&self) -> String {
            "slow".into()
        }
    }

    struct HangingSource;

    #[async_trait]
    impl PageSource for HangingSource {
        async fn fetch(&self) -> Result<FetchedPage> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(Error::Fetch("unreachable".into()))
        }

        fn describe(&self) -> String {
            "hanging".into()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<NewItems>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, items: &NewItems) -> Result<()> {
            self.seen.lock().unwrap().push(items.clone());
            Ok(())
        }
    }

    fn timing() -> TimingConfig {
        TimingConfig {
            poll_interval_secs: 180,
            fetch_timeout_secs: 30,
            heartbeat_interval_secs: 60,
        }
    }

    fn poller(source: Arc<dyn PageSource>, notifier: Arc<RecordingNotifier>) -> Poller {
        let parser = PageParser::new(&SourceConfig::default()).expect("parser");
        Poller::new(source, parser, notifier, &timing())
    }

    #[tokio::test]
    async fn test_first_cycle_sets_baseline_without_notifying() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = ScriptedSource::new(vec![Ok(page(&[("Open", &["all"])], &["SetA"]))]);
        let mut p = poller(source, notifier.clone());

        let outcome = p.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Baseline { cycle: 1, records: 2 }));
        assert!(notifier.seen.lock().unwrap().is_empty());
        assert_eq!(p.cache().cycle(), 1);
        assert_eq!(p.state(), PollState::Idle);
    }

    #[tokio::test]
    async fn test_unchanged_page_reports_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let body = page(&[("Open", &["all"])], &["SetA"]);
        let source = ScriptedSource::new(vec![Ok(body.clone()), Ok(body)]);
        let mut p = poller(source, notifier.clone());

        p.run_cycle().await;
        let outcome = p.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::NoChanges { cycle: 2 }));
        assert!(notifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_cycle_leaves_cache_for_next_diff() {
        let notifier = Arc::new(RecordingNotifier::default());
        let cycle1 = page(&[("Open", &["all"])], &["SetA"]);
        let cycle3 = page(&[("Open", &["all"]), ("Invitational", &["combined", "jv"])], &["SetA"]);
        let source = ScriptedSource::new(vec![
            Ok(cycle1),
            Err(Error::Fetch("connection reset".into())),
            Ok(cycle3),
        ]);
        let mut p = poller(source, notifier.clone());
        let mut status = p.status_receiver();

        assert!(p.run_cycle().await.is_success());
        let baseline_at = p.cache().snapshot().map(|s| s.captured_at);

        let failed = p.run_cycle().await;
        assert!(matches!(failed, CycleOutcome::Failed { error: Error::Fetch(_) }));
        assert_eq!(p.cache().cycle(), 1);
        assert_eq!(p.cache().snapshot().map(|s| s.captured_at), baseline_at);
        assert_eq!(status.borrow_and_update().consecutive_failures, 1);
        assert_eq!(status.borrow().to_string(), "cycle 1 (1 failing)");

        let items = match p.run_cycle().await {
            CycleOutcome::NewItems(items) => items,
            other => panic!("expected new items, got {:?}", other),
        };
        assert_eq!(items.cycle, 2);
        assert_eq!(items.stats.len(), 1);
        assert_eq!(items.stats[0].tournament_name, "Invitational");
        assert_eq!(items.stats[0].stat_reports.len(), 2);
        assert!(items.sets.is_empty());

        assert_eq!(notifier.seen.lock().unwrap().len(), 1);
        assert_eq!(p.cache().cycle(), 2);
        assert_eq!(p.cache().snapshot().map(|s| s.stats.len()), Some(2));
        assert_eq!(status.borrow().to_string(), "cycle 2");
    }

    #[tokio::test]
    async fn test_layout_change_is_parse_failure() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = ScriptedSource::new(vec![Ok("<html><body>redesigned</body></html>".into())]);
        let mut p = poller(source, notifier);

        let outcome = p.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Failed { error: Error::Parse(_) }));
        assert!(!p.cache().has_baseline());
    }

    #[tokio::test]
    async fn test_grown_tournament_notifies_again() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = ScriptedSource::new(vec![
            Ok(page(&[("Open", &["all"])], &[])),
            Ok(page(&[("Open", &["all", "jv"])], &[])),
        ]);
        let mut p = poller(source, notifier.clone());

        p.run_cycle().await;
        p.run_cycle().await;

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].stats[0].tournament_name, "Open");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_times_out() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut p = poller(Arc::new(HangingSource), notifier);

        let outcome = p.run_cycle().await;

        let error = match outcome {
            CycleOutcome::Failed { error } => error,
            other => panic!("expected timeout failure, got {:?}", other),
        };
        assert!(error.to_string().contains("within 30s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_stopped() {
        let notifier = Arc::new(RecordingNotifier::default());
        let body = page(&[("Open", &["all"])], &["SetA"]);
        let p = poller(Arc::new(StaticSource(body)), notifier);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(p.run(stop_rx));
        // Ticks at 0s, 180s and 360s.
        tokio::time::sleep(Duration::from_secs(400)).await;
        stop_tx.send_replace(true);

        let cache = handle.await.expect("poll task");
        assert_eq!(cache.cycle(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_fetch_lets_cycle_finish() {
        let notifier = Arc::new(RecordingNotifier::default());
        let body = page(&[("Open", &["all"])], &["SetA"]);
        let p = poller(Arc::new(SlowSource(body)), notifier);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(p.run(stop_rx));
        // First tick fires at once; the fetch is still in flight at 2s.
        tokio::time::sleep(Duration::from_secs(2)).await;
        stop_tx.send_replace(true);

        let cache = handle.await.expect("poll task");
        assert_eq!(cache.cycle(), 1);
        assert!(cache.has_baseline());
    }
}
