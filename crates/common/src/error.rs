//! Unified error type for the primed bot.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Page layout mismatch: {0}")]
    Parse(String),

    /// Reserved: snapshot diffing is total and never produces this today.
    #[error("Diff failed: {0}")]
    Diff(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Subscriber {0} already exists")]
    DuplicateSubscriber(u64),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors that only abort the current poll cycle.
    pub fn is_cycle_local(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::Parse(_) | Error::Diff(_))
    }

    /// Short machine-readable label for journal events.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Fetch(_) => "fetch",
            Error::Parse(_) => "parse",
            Error::Diff(_) => "diff",
            Error::Config(_) => "config",
            Error::DuplicateSubscriber(_) => "duplicate_subscriber",
            Error::Json(_) => "json",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }
}
