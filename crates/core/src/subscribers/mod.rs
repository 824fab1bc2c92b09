//! Live-subscriber broadcast registry. Deliberately not a
//! `tokio::sync::broadcast::Sender`, which would silently drop lagging
//! subscribers. This registry instead snapshots the subscriber list under
//! the lock, sends outside it, and removes whichever ids reported a send
//! failure — no message is ever silently dropped for a subscriber that is
//! still connected.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LogEntry, Match};

pub type SubscriberId = u64;

/// §6's `new_match` envelope body: `{item,url,site,torrent_text,created}`,
/// not the raw persisted `Match` row (which carries `id`/`item_id`/
/// `matched_title`/`matched_url`/`source_site`/... instead). Kept as its
/// own projection rather than reusing `MatchView` from the server crate,
/// since `core` cannot depend on `server`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEvent {
    pub item: i64,
    pub url: String,
    pub site: String,
    pub torrent_text: String,
    pub created: DateTime<Utc>,
}

impl From<&Match> for MatchEvent {
    fn from(m: &Match) -> Self {
        Self {
            item: m.item_id,
            url: m.matched_url.clone(),
            site: m.source_site.clone(),
            torrent_text: m.matched_title.clone(),
            created: m.created,
        }
    }
}

/// §6's `new_log` envelope body: `{description,success,timestamp}`, with
/// no `id` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub description: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<&LogEntry> for LogEvent {
    fn from(l: &LogEntry) -> Self {
        Self {
            description: l.description.clone(),
            success: l.success,
            timestamp: l.timestamp,
        }
    }
}

/// The three envelope shapes the API layer ever broadcasts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEnvelope {
    WorkerStatus {
        status: WorkerStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    NewMatch {
        #[serde(rename = "match")]
        item: MatchEvent,
    },
    NewLog {
        log: LogEvent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    #[serde(rename = "running")]
    Started,
    Completed,
    Failed,
}

impl WsEnvelope {
    pub fn worker_status(status: WorkerStatus, message: Option<String>) -> Self {
        Self::WorkerStatus { status, message }
    }

    pub fn new_match(record: &Match) -> Self {
        Self::NewMatch { item: record.into() }
    }

    pub fn new_log(log: &LogEntry) -> Self {
        Self::NewLog { log: log.into() }
    }
}

/// A connected client capable of receiving a serialized event. The axum
/// WebSocket adapter implementing this trait lives in the server crate,
/// where the `WebSocket` split-sink type is available.
#[async_trait::async_trait]
pub trait LiveSubscriber: Send + Sync {
    async fn send(&self, envelope: &WsEnvelope) -> Result<(), ()>;
    fn id(&self) -> SubscriberId;
}

#[derive(Default)]
pub struct LiveSubscriberRegistry {
    subscribers: Mutex<Vec<Arc<dyn LiveSubscriber>>>,
}

impl LiveSubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: Arc<dyn LiveSubscriber>) {
        self.subscribers.lock().unwrap().push(subscriber);
    }

    pub fn unregister(&self, id: SubscriberId) {
        self.subscribers.lock().unwrap().retain(|s| s.id() != id);
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the subscriber list under the lock, send outside it, then
    /// reacquire the lock once to drop every id that failed to deliver.
    pub async fn broadcast(&self, envelope: WsEnvelope) {
        let snapshot: Vec<Arc<dyn LiveSubscriber>> =
            self.subscribers.lock().unwrap().iter().cloned().collect();
        if snapshot.is_empty() {
            return;
        }

        let mut failed = Vec::new();
        for subscriber in snapshot {
            if subscriber.send(&envelope).await.is_err() {
                failed.push(subscriber.id());
            }
        }

        if !failed.is_empty() {
            let mut guard = self.subscribers.lock().unwrap();
            guard.retain(|s| !failed.contains(&s.id()));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatusSnapshot {
    pub running: bool,
    pub last_run_started: Option<DateTime<Utc>>,
    pub last_run_completed: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSubscriber {
        id: SubscriberId,
        received: Mutex<Vec<WsEnvelope>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl LiveSubscriber for RecordingSubscriber {
        async fn send(&self, envelope: &WsEnvelope) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.received.lock().unwrap().push(envelope.clone());
            Ok(())
        }

        fn id(&self) -> SubscriberId {
            self.id
        }
    }

    #[tokio::test]
    async fn broadcast_delivers_to_every_registered_subscriber() {
        let registry = LiveSubscriberRegistry::new();
        let a = Arc::new(RecordingSubscriber {
            id: 1,
            received: Mutex::new(vec![]),
            fail: false,
        });
        registry.register(a.clone());

        registry
            .broadcast(WsEnvelope::worker_status(WorkerStatus::Started, None))
            .await;

        assert_eq!(a.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_removes_subscriber_from_registry() {
        let registry = LiveSubscriberRegistry::new();
        let failing = Arc::new(RecordingSubscriber {
            id: 1,
            received: Mutex::new(vec![]),
            fail: true,
        });
        registry.register(failing);
        assert_eq!(registry.len(), 1);

        registry
            .broadcast(WsEnvelope::worker_status(WorkerStatus::Started, None))
            .await;

        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn empty_registry_broadcast_is_a_no_op() {
        let registry = LiveSubscriberRegistry::new();
        registry
            .broadcast(WsEnvelope::worker_status(WorkerStatus::Completed, None))
            .await;
        assert!(registry.is_empty());
    }

    #[test]
    fn new_match_envelope_projects_only_the_documented_fields() {
        let record = Match {
            id: 42,
            item_id: 7,
            matched_title: "Dune.2021.1080p.BluRay.x264".to_string(),
            matched_url: "https://example.test/t/1".to_string(),
            source_site: "examplesite".to_string(),
            magnet_uri: None,
            file_size: None,
            entities: None,
            created: Utc::now(),
        };
        let json = serde_json::to_value(WsEnvelope::new_match(&record)).unwrap();
        let inner = &json["match"];
        assert_eq!(inner["item"], 7);
        assert_eq!(inner["url"], "https://example.test/t/1");
        assert_eq!(inner["site"], "examplesite");
        assert_eq!(inner["torrent_text"], "Dune.2021.1080p.BluRay.x264");
        assert!(inner.get("id").is_none());
        assert!(inner.get("matched_url").is_none());
    }

    #[test]
    fn new_log_envelope_omits_the_row_id() {
        let log = LogEntry {
            id: 9,
            timestamp: Utc::now(),
            description: "Dune 2021 found 1 match(es)".to_string(),
            success: true,
        };
        let json = serde_json::to_value(WsEnvelope::new_log(&log)).unwrap();
        let inner = &json["log"];
        assert_eq!(inner["description"], "Dune 2021 found 1 match(es)");
        assert_eq!(inner["success"], true);
        assert!(inner.get("id").is_none());
    }
}
