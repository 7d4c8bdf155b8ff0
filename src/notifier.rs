//! Fan-out of newly found records to opted-in subscribers.
//!
//! Delivery to the chat platform lives outside this process; here each new
//! record is logged and journaled together with the subscriber ids that
//! should receive it. A journal write failure fails the notification.

use async_trait::async_trait;
use common::{RecordKind, Result};
use serde_json::json;
use tracing::info;
use tracker::{NewItems, Notifier};

use crate::journal::{record, SharedJournal};
use crate::subscribers::SubscriberDirectory;

pub struct JournalNotifier {
    subscribers: SubscriberDirectory,
    journal: SharedJournal,
}

impl JournalNotifier {
    pub fn new(subscribers: SubscriberDirectory, journal: SharedJournal) -> Self {
        Self {
            subscribers,
            journal,
        }
    }

    fn recipient_ids(&self, kind: RecordKind) -> Vec<u64> {
        self.subscribers
            .recipients(kind)
            .iter()
            .map(|s| s.id)
            .collect()
    }
}

/// Journal kind for a batch of new records: `new_stats` or `new_sets`.
fn event_kind(kind: RecordKind) -> String {
    format!("new_{}", kind.as_str())
}

#[async_trait]
impl Notifier for JournalNotifier {
    async fn notify(&self, items: &NewItems) -> Result<()> {
        if !items.stats.is_empty() {
            let recipients = self.recipient_ids(RecordKind::Stats);
            for t in &items.stats {
                let reports: Vec<_> = t
                    .stat_reports
                    .iter()
                    .map(|r| json!({"name": &r.name, "link": r.link.as_str()}))
                    .collect();
                info!(
                    "📊 New stats: {} ({} reports) → {} subscribers",
                    t.tournament_name,
                    t.stat_reports.len(),
                    recipients.len()
                );
                record(
                    &self.journal,
                    &event_kind(RecordKind::Stats),
                    json!({
                        "cycle": items.cycle,
                        "tournament": &t.tournament_name,
                        "link": t.tournament_link.as_str(),
                        "reports": reports,
                        "recipients": &recipients
                    }),
                )
                .await?;
            }
        }

        if !items.sets.is_empty() {
            let recipients = self.recipient_ids(RecordKind::Sets);
            for s in &items.sets {
                info!("📚 New set: {} → {} subscribers", s.name, recipients.len());
                record(
                    &self.journal,
                    &event_kind(RecordKind::Sets),
                    json!({
                        "cycle": items.cycle,
                        "set": &s.name,
                        "link": s.link.as_str(),
                        "recipients": &recipients
                    }),
                )
                .await?;
            }
        }

        Ok(())
    }
}
