//! Subscriber preferences, persisted as a JSON array on disk.
//!
//! Subscribers are keyed by their chat-platform user id; everything else on
//! the record is informational or delivery metadata.

use std::path::{Path, PathBuf};

use common::{Error, RecordKind, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_true")]
    pub stats: bool,
    #[serde(default = "default_true")]
    pub sets: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            stats: true,
            sets: true,
        }
    }
}

impl Preferences {
    pub fn wants(&self, kind: RecordKind) -> bool {
        match kind {
            RecordKind::Stats => self.stats,
            RecordKind::Sets => self.sets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub global_name: String,
    #[serde(default)]
    pub dm_channel_id: u64,
    #[serde(default)]
    pub preferences: Preferences,
}

/// File-backed subscriber list.
#[derive(Debug, Clone)]
pub struct SubscriberDirectory {
    path: PathBuf,
    subscribers: Vec<Subscriber>,
}

impl SubscriberDirectory {
    /// Load from `path`; a missing file is an empty directory.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let subscribers = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            debug!("No subscriber file at {}", path.display());
            Vec::new()
        };
        Ok(Self { path, subscribers })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.subscribers)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn exists(&self, id: u64) -> bool {
        self.subscribers.iter().any(|s| s.id == id)
    }

    pub fn get(&self, id: u64) -> Option<&Subscriber> {
        self.subscribers.iter().find(|s| s.id == id)
    }

    pub fn all(&self) -> &[Subscriber] {
        &self.subscribers
    }

    pub fn add(&mut self, subscriber: Subscriber) -> Result<()> {
        if self.exists(subscriber.id) {
            return Err(Error::DuplicateSubscriber(subscriber.id));
        }
        self.subscribers.push(subscriber);
        Ok(())
    }

    /// Replace the stored record with the same id. Returns `false` if absent.
    pub fn update(&mut self, subscriber: Subscriber) -> bool {
        match self.subscribers.iter_mut().find(|s| s.id == subscriber.id) {
            Some(slot) => {
                *slot = subscriber;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u64) -> Option<Subscriber> {
        let idx = self.subscribers.iter().position(|s| s.id == id)?;
        Some(self.subscribers.remove(idx))
    }

    /// Fails with the first id that appears more than once (hand-edited files).
    pub fn check_for_duplicates(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for s in &self.subscribers {
            if !seen.insert(s.id) {
                return Err(Error::DuplicateSubscriber(s.id));
            }
        }
        Ok(())
    }

    /// Subscribers who opted into `kind`, in file order.
    pub fn recipients(&self, kind: RecordKind) -> Vec<&Subscriber> {
        self.subscribers
            .iter()
            .filter(|s| s.preferences.wants(kind))
            .collect()
    }
}
