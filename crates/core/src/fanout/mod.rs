//! Notification fan-out: dispatch SMS on first-time matches and broadcast
//! typed events to live subscribers. Called directly from the worker loop
//! as plain async methods rather than through a channel — the worker is
//! strictly serial, so there is no concurrent producer to decouple from.

mod sms;

pub use sms::SmsClient;

use std::sync::Arc;

use tracing::warn;

use crate::store::LogStore;
use crate::subscribers::{LiveSubscriberRegistry, WorkerStatus, WsEnvelope};
use crate::types::{Candidate, Item, Match, Site};

pub struct NotificationFanout {
    registry: Arc<LiveSubscriberRegistry>,
    log_store: Arc<dyn LogStore>,
    sms: Option<SmsClient>,
}

impl NotificationFanout {
    pub fn new(
        registry: Arc<LiveSubscriberRegistry>,
        log_store: Arc<dyn LogStore>,
        sms: Option<SmsClient>,
    ) -> Self {
        Self {
            registry,
            log_store,
            sms,
        }
    }

    /// Called once per confirmed, newly-inserted match. Never called for a
    /// duplicate.
    pub async fn on_new_match(&self, item: &Item, candidate: &Candidate, site: &Site, record: Match) {
        self.registry.broadcast(WsEnvelope::new_match(&record)).await;

        if let Some(sms) = &self.sms {
            let body = format!(
                "New match for \"{}\": {} ({})",
                item.text,
                candidate.title,
                site.name()
            );
            if let Err(e) = sms.send(&body).await {
                warn!(item_id = item.id, error = %e, "SMS dispatch failed");
            }
        }
    }

    /// Called exactly once per item, after every site has been searched.
    pub async fn on_item_complete(&self, item: &Item, matches_found: usize) {
        let success = matches_found > 0;
        let description = if success {
            format!("{} found {} match(es)", item.text, matches_found)
        } else {
            format!("{} found no matches", item.text)
        };

        let log = match self.log_store.insert(&description, success).await {
            Ok(log) => log,
            Err(e) => {
                warn!(item_id = item.id, error = %e, "failed to persist run log");
                return;
            }
        };

        self.registry.broadcast(WsEnvelope::new_log(&log)).await;
    }

    pub async fn broadcast_worker_status(&self, status: WorkerStatus, message: Option<String>) {
        self.registry
            .broadcast(WsEnvelope::worker_status(status, message))
            .await;
    }
}
