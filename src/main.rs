//! Primed: quizbowl database update notifier.
//!
//! Single-binary Tokio application that:
//! 1. Polls the database front page on a fixed interval
//! 2. Parses recent tournament stats and posted question sets
//! 3. Diffs each poll against the last good snapshot
//! 4. Fans new records out to opted-in subscribers via the event journal

mod config;
mod journal;
mod notifier;
mod subscribers;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use common::config::BotConfig;
use common::RecordKind;
use hsqb_client::{source_from_config, PageParser};
use tracker::{CycleOutcome, PollStatus, Poller, PollerLifecycle};

use journal::{record_or_warn, EventJournal, SharedJournal};
use notifier::JournalNotifier;
use subscribers::{Preferences, Subscriber, SubscriberDirectory};

/// Quizbowl stats and question-set notifier
#[derive(Parser)]
#[command(name = "primed", about = "Notifies subscribers of new quizbowl stats and sets")]
struct Cli {
    /// Run a single poll cycle, print what was found, and exit.
    #[arg(long)]
    once: bool,

    /// Read this local HTML file instead of the live page.
    #[arg(long, value_name = "PATH")]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Add a subscriber.
    Subscribe {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        username: String,
        #[arg(long, default_value_t = 0)]
        dm_channel_id: u64,
        /// Do not send tournament stats.
        #[arg(long)]
        no_stats: bool,
        /// Do not send question sets.
        #[arg(long)]
        no_sets: bool,
    },
    /// Change what an existing subscriber receives.
    Prefs {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        stats: Option<bool>,
        #[arg(long)]
        sets: Option<bool>,
    },
    /// Remove a subscriber.
    Unsubscribe {
        #[arg(long)]
        id: u64,
    },
    /// List subscribers and their preferences.
    Subscribers,
}

fn format_uptime(started: DateTime<Utc>) -> String {
    let secs = (Utc::now() - started).num_seconds().max(0);
    let (hours, rem) = (secs / 3600, secs % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    format!("{}h{:02}m{:02}s", hours, minutes, seconds)
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "primed=info,hsqb_client=info,tracker=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let started_at = Utc::now();

    // Load configuration.
    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(path) = &cli.fixture {
        cfg.source.test_mode = true;
        cfg.source.fixture_path = path.display().to_string();
    }

    // ── Subscriber administration ────────────────────────────────────
    if let Some(command) = cli.command {
        if let Err(e) = run_admin(&cfg, command) {
            error!("{}", e);
            std::process::exit(1);
        }
        return;
    }

    info!("Primed starting up...");
    info!(
        "Source: {} ({})",
        if cfg.source.test_mode {
            &cfg.source.fixture_path
        } else {
            &cfg.source.url
        },
        if cfg.source.test_mode { "fixture" } else { "live" }
    );
    info!(
        "Timing: poll={}s, fetch_timeout={}s, heartbeat={}s",
        cfg.timing.poll_interval_secs,
        cfg.timing.fetch_timeout_secs,
        cfg.timing.heartbeat_interval_secs
    );

    let journal = match EventJournal::open(PathBuf::from(&cfg.notify.events_dir)) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to initialize event journal: {}", e);
            std::process::exit(1);
        }
    };
    info!("Event journal path: {}", journal.dir().display());
    let event_journal: SharedJournal = Arc::new(Mutex::new(journal));

    let subscribers = match SubscriberDirectory::load(&cfg.notify.subscribers_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load subscribers: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = subscribers.check_for_duplicates() {
        warn!("Subscriber file has duplicates: {}", e);
    }
    info!(
        "Subscribers: {} ({} stats, {} sets)",
        subscribers.len(),
        subscribers.recipients(RecordKind::Stats).len(),
        subscribers.recipients(RecordKind::Sets).len()
    );

    record_or_warn(
        &event_journal,
        "bot_start",
        json!({
            "bot": "primed",
            "mode": if cli.once { "once" } else { "loop" },
            "test_mode": cfg.source.test_mode,
            "source": &cfg.source.url,
            "subscribers": subscribers.len(),
            "timing": {
                "poll_interval_secs": cfg.timing.poll_interval_secs,
                "fetch_timeout_secs": cfg.timing.fetch_timeout_secs
            }
        }),
    )
    .await;

    let poller = match build_poller(&cfg, subscribers, event_journal.clone()) {
        Ok(p) => p,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    // ── Single-cycle mode ────────────────────────────────────────────
    if cli.once {
        run_once(poller, &event_journal).await;
        return;
    }

    // ── Spawn tasks ──────────────────────────────────────────────────
    let status_rx = poller.status_receiver();
    let mut lifecycle = PollerLifecycle::new(poller);
    lifecycle.on_ready();

    // Task 1: cycle journaling
    let cycle_rx = status_rx.clone();
    let cycle_journal = event_journal.clone();
    let cycle_handle = tokio::spawn(async move {
        journal_cycles(cycle_rx, &cycle_journal).await;
    });

    // Task 2: Heartbeat
    let hb_rx = status_rx.clone();
    let hb_journal = event_journal.clone();
    let hb_interval = Duration::from_secs(cfg.timing.heartbeat_interval_secs);
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(hb_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let status = hb_rx.borrow().clone();
            let uptime = format_uptime(started_at);
            info!("HEARTBEAT: {} uptime={}", status, uptime);
            record_or_warn(
                &hb_journal,
                "heartbeat",
                json!({
                    "status": status.to_string(),
                    "cycle": status.cycle,
                    "consecutive_failures": status.consecutive_failures,
                    "uptime": uptime
                }),
            )
            .await;
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("🚀 Primed is running. Press Ctrl+C to stop.");

    let shutdown_reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            "ctrl_c"
        }
        r = lifecycle.join() => {
            error!("Poll task exited: cycles={:?}", r.map(|c| c.cycle()));
            "poll_task_exit"
        }
    };

    if let Some(cache) = lifecycle.on_shutdown().await {
        info!("Poll loop stopped after {} cycles", cache.cycle());
    }
    heartbeat_handle.abort();
    cycle_handle.abort();

    record_or_warn(
        &event_journal,
        "bot_shutdown",
        json!({
            "reason": shutdown_reason,
            "uptime": format_uptime(started_at)
        }),
    )
    .await;

    info!("Primed shut down.");
}

fn build_poller(
    cfg: &BotConfig,
    subscribers: SubscriberDirectory,
    journal: SharedJournal,
) -> common::Result<Poller> {
    let source = source_from_config(&cfg.source, &cfg.timing)?;
    let parser = PageParser::new(&cfg.source)?;
    let notifier = Arc::new(JournalNotifier::new(subscribers, journal));
    Ok(Poller::new(source, parser, notifier, &cfg.timing))
}

// ── Task implementations ────────────────────────────────────────────

async fn run_once(mut poller: Poller, journal: &SharedJournal) {
    info!("Running single poll cycle...");
    let outcome = poller.run_cycle().await;

    if let Some(snapshot) = poller.cache().snapshot() {
        for t in &snapshot.stats {
            let reports: Vec<_> = t.stat_reports.iter().map(|r| r.name.as_str()).collect();
            info!("  📊 {} [{}] | {}", t.tournament_name, reports.join(", "), t.tournament_link);
        }
        for s in &snapshot.sets {
            info!("  📚 {} | {}", s.name, s.link);
        }
    }

    let (status, error) = match &outcome {
        CycleOutcome::Failed { error } => ("error", Some((error.kind(), error.to_string()))),
        _ => ("ok", None),
    };
    record_or_warn(
        journal,
        "once_summary",
        json!({
            "status": status,
            "error_kind": error.as_ref().map(|(kind, _)| *kind),
            "error": error.map(|(_, msg)| msg),
            "stats": poller.cache().snapshot().map(|s| s.stats.len()),
            "sets": poller.cache().snapshot().map(|s| s.sets.len())
        }),
    )
    .await;

    if let CycleOutcome::Failed { error } = outcome {
        error!("Poll failed: {}", error);
        std::process::exit(1);
    }
}

async fn journal_cycles(mut status_rx: watch::Receiver<PollStatus>, journal: &SharedJournal) {
    while status_rx.changed().await.is_ok() {
        let status = status_rx.borrow_and_update().clone();
        let (kind, fields) = if status.consecutive_failures > 0 {
            (
                "cycle_failed",
                json!({
                    "cycle": status.cycle,
                    "consecutive_failures": status.consecutive_failures,
                    "error": status.last_error
                }),
            )
        } else {
            (
                if status.cycle == 1 { "baseline" } else { "cycle_ok" },
                json!({
                    "cycle": status.cycle,
                    "captured_at": status.last_success_at.map(|t| t.to_rfc3339())
                }),
            )
        };
        record_or_warn(journal, kind, fields).await;
    }
}

fn run_admin(cfg: &BotConfig, command: Command) -> common::Result<()> {
    let mut directory = SubscriberDirectory::load(&cfg.notify.subscribers_path)?;

    match command {
        Command::Subscribe {
            id,
            username,
            dm_channel_id,
            no_stats,
            no_sets,
        } => {
            directory.add(Subscriber {
                id,
                global_name: username.clone(),
                username,
                dm_channel_id,
                preferences: Preferences {
                    stats: !no_stats,
                    sets: !no_sets,
                },
            })?;
            directory.save()?;
            info!("Subscribed {} ({})", id, directory.path().display());
        }
        Command::Prefs { id, stats, sets } => {
            let mut subscriber = directory
                .get(id)
                .cloned()
                .ok_or_else(|| common::Error::Other(format!("no subscriber {}", id)))?;
            if let Some(stats) = stats {
                subscriber.preferences.stats = stats;
            }
            if let Some(sets) = sets {
                subscriber.preferences.sets = sets;
            }
            directory.update(subscriber);
            directory.save()?;
            info!("Updated preferences for {}", id);
        }
        Command::Unsubscribe { id } => {
            if directory.remove(id).is_none() {
                warn!("No subscriber {}", id);
                return Ok(());
            }
            directory.save()?;
            info!("Unsubscribed {}", id);
        }
        Command::Subscribers => {
            for s in directory.all() {
                info!(
                    "{} {} stats={} sets={}",
                    s.id, s.username, s.preferences.stats, s.preferences.sets
                );
            }
            info!("{} subscribers", directory.len());
        }
    }

    Ok(())
}
