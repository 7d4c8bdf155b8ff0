//! Append-only JSONL event journal, one file per UTC day.
//!
//! Every line is an object with `ts` and `kind` followed by the event's own
//! fields. Appends return their I/O errors so callers that must account for
//! delivery (the notifier) can surface them; fire-and-forget callers go
//! through [`record_or_warn`].

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, SecondsFormat, Utc};
use common::Result;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::warn;

pub type SharedJournal = Arc<Mutex<EventJournal>>;

pub struct EventJournal {
    dir: PathBuf,
    day: NaiveDate,
    file: File,
}

impl EventJournal {
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        let day = Utc::now().date_naive();
        let file = append_to(&day_file(&dir, day))?;
        Ok(Self { dir, day, file })
    }

    /// Append one `kind` event. Object `fields` are flattened into the line;
    /// anything else is stored under `data`.
    pub fn append(&mut self, kind: &str, fields: Value) -> Result<()> {
        let now = Utc::now();
        if now.date_naive() != self.day {
            self.day = now.date_naive();
            self.file = append_to(&day_file(&self.dir, self.day))?;
        }

        let mut line = Map::new();
        line.insert(
            "ts".into(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        line.insert("kind".into(), Value::String(kind.to_string()));
        match fields {
            Value::Object(extra) => line.extend(extra),
            Value::Null => {}
            other => {
                line.insert("data".into(), other);
            }
        }

        serde_json::to_writer(&mut self.file, &line)?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_file(&self) -> PathBuf {
        day_file(&self.dir, self.day)
    }
}

fn day_file(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join(format!("events-{}.jsonl", day.format("%Y-%m-%d")))
}

fn append_to(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

pub async fn record(journal: &SharedJournal, kind: &str, fields: Value) -> Result<()> {
    journal.lock().await.append(kind, fields)
}

/// Journal an operational event; a failed write is logged and dropped.
pub async fn record_or_warn(journal: &SharedJournal, kind: &str, fields: Value) {
    if let Err(e) = record(journal, kind, fields).await {
        warn!("Could not journal {} event: {}", kind, e);
    }
}
