//! Configuration loader: merges env vars, .env file, and config.toml.

use common::config::BotConfig;
use common::Error;
use std::path::Path;
use url::Url;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

pub fn validate_config(config: &BotConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if Url::parse(&config.source.url).is_err() {
        issues.push(format!("source.url is not a valid URL: {}", config.source.url));
    }
    if Url::parse(&config.source.base_url).is_err() {
        issues.push(format!(
            "source.base_url is not a valid URL: {}",
            config.source.base_url
        ));
    }
    if config.source.stats_selector.trim().is_empty() {
        issues.push("source.stats_selector must not be empty".into());
    }
    if config.source.sets_selector.trim().is_empty() {
        issues.push("source.sets_selector must not be empty".into());
    }
    if config.source.test_mode && config.source.fixture_path.trim().is_empty() {
        issues.push("source.fixture_path is required in test mode".into());
    }

    if config.timing.poll_interval_secs == 0 {
        issues.push("timing.poll_interval_secs must be > 0".into());
    }
    if config.timing.fetch_timeout_secs == 0 {
        issues.push("timing.fetch_timeout_secs must be > 0".into());
    }
    if config.timing.fetch_timeout_secs > config.timing.poll_interval_secs {
        issues.push("timing.fetch_timeout_secs must be <= timing.poll_interval_secs".into());
    }
    if config.timing.heartbeat_interval_secs == 0 {
        issues.push("timing.heartbeat_interval_secs must be > 0".into());
    }

    if config.notify.subscribers_path.trim().is_empty() {
        issues.push("notify.subscribers_path must not be empty".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply environment overrides on top of whatever the file produced.
fn apply_env(config: &mut BotConfig) -> Result<(), Error> {
    if let Ok(url) = std::env::var("PRIMED_SOURCE_URL") {
        config.source.url = url.trim().to_string();
    }
    if let Ok(url) = std::env::var("PRIMED_BASE_URL") {
        config.source.base_url = url.trim().to_string();
    }
    if let Ok(raw) = std::env::var("PRIMED_TEST_MODE") {
        config.source.test_mode = parse_bool(&raw);
    }
    if let Ok(path) = std::env::var("PRIMED_FIXTURE_PATH") {
        config.source.fixture_path = path;
    }
    if let Ok(raw) = std::env::var("PRIMED_POLL_INTERVAL_SECS") {
        config.timing.poll_interval_secs = parse_positive_u64(&raw, "PRIMED_POLL_INTERVAL_SECS")?;
    }
    if let Ok(raw) = std::env::var("PRIMED_FETCH_TIMEOUT_SECS") {
        config.timing.fetch_timeout_secs = parse_positive_u64(&raw, "PRIMED_FETCH_TIMEOUT_SECS")?;
    }
    if let Ok(raw) = std::env::var("PRIMED_HEARTBEAT_INTERVAL_SECS") {
        config.timing.heartbeat_interval_secs =
            parse_positive_u64(&raw, "PRIMED_HEARTBEAT_INTERVAL_SECS")?;
    }
    if let Ok(path) = std::env::var("PRIMED_SUBSCRIBERS_PATH") {
        config.notify.subscribers_path = path;
    }
    if let Ok(dir) = std::env::var("EVENTS_DIR") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            config.notify.events_dir = trimmed.to_string();
        }
    }
    Ok(())
}

/// Parse a config.toml body; missing sections fall back to defaults.
pub fn parse_config_toml(contents: &str) -> Result<BotConfig, Error> {
    toml::from_str(contents)
        .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))
}

/// Load bot configuration from environment and optional config file.
pub fn load_config() -> Result<BotConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = BotConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = parse_config_toml(&contents)?;
    }

    // 4. Override with environment variables (highest priority).
    apply_env(&mut config)?;

    validate_config(&config)?;

    Ok(config)
}
