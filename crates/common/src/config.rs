//! Bot configuration types.

use serde::{Deserialize, Serialize};

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Where the page comes from and how to read it.
    #[serde(default)]
    pub source: SourceConfig,

    /// Timing parameters (seconds).
    #[serde(default)]
    pub timing: TimingConfig,

    /// Subscriber and journal locations.
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Source page location and layout markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Page that is polled.
    #[serde(default = "default_source_url")]
    pub url: String,

    /// Base that relative links on the page are resolved against.
    #[serde(default = "default_source_url")]
    pub base_url: String,

    /// CSS selector for the list holding recent tournament stats.
    #[serde(default = "default_stats_selector")]
    pub stats_selector: String,

    /// CSS selector for the list holding recently posted sets.
    #[serde(default = "default_sets_selector")]
    pub sets_selector: String,

    /// Read `fixture_path` instead of hitting the network.
    #[serde(default)]
    pub test_mode: bool,

    /// Local HTML document used in test mode.
    #[serde(default = "default_fixture_path")]
    pub fixture_path: String,

    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Timing configuration (all values in seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Interval between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Deadline for a single page fetch.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Interval between heartbeat log lines.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

/// Where notification state lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// JSON file holding subscriber preferences.
    #[serde(default = "default_subscribers_path")]
    pub subscribers_path: String,

    /// Directory for the JSONL event journal.
    #[serde(default = "default_events_dir")]
    pub events_dir: String,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_source_url() -> String {
    "https://hsquizbowl.org/db/".into()
}
fn default_stats_selector() -> String {
    "#recent-stats > ul".into()
}
fn default_sets_selector() -> String {
    "#recent-sets > ul".into()
}
fn default_fixture_path() -> String {
    "fixtures/hsqb_front_page.html".into()
}
fn default_user_agent() -> String {
    "primed/0.1 (quizbowl update notifier)".into()
}

fn default_poll_interval() -> u64 {
    180
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_heartbeat_interval() -> u64 {
    60
}

fn default_subscribers_path() -> String {
    "subscribers.json".into()
}
fn default_events_dir() -> String {
    "EVENTS/primed".into()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            base_url: default_source_url(),
            stats_selector: default_stats_selector(),
            sets_selector: default_sets_selector(),
            test_mode: false,
            fixture_path: default_fixture_path(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            subscribers_path: default_subscribers_path(),
            events_dir: default_events_dir(),
        }
    }
}
