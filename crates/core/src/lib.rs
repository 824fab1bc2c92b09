// Allow some clippy lints that are too noisy for this codebase
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::needless_borrow)]
#![allow(clippy::collapsible_if)]

pub mod config;
pub mod engine;
pub mod entities;
pub mod fanout;
pub mod fuzzy;
pub mod metrics;
pub mod scheduler;
pub mod sites;
pub mod store;
pub mod subscribers;
pub mod textgate;
pub mod types;
pub mod worker;

pub use config::{
    load_config, validate_config, Config, ConfigError, EntityMatchingConfig, SanitizedConfig,
    ServerConfig, SmsConfig, WorkerConfig,
};
pub use engine::{Engine, EngineError};
pub use entities::{EntityExtractor, ExtractError, LlmSupervisor, OllamaEntityExtractor, SupervisorError};
pub use fanout::{NotificationFanout, SmsClient};
pub use fuzzy::FuzzyScorer;
pub use scheduler::{Scheduler, TriggerOutcome, WorkerGate};
pub use sites::{
    ChromiumMagnetExtractor, ChromiumSiteAdapter, MagnetExtractor, NullSiteAdapter, SiteAdapter,
    SiteError,
};
pub use store::{
    InsertOutcome, ItemStore, LogPage, LogStore, MatchStore, SiteStore, SqliteStore, StoreError,
};
pub use subscribers::{
    LiveSubscriber, LiveSubscriberRegistry, LogEvent, MatchEvent, SubscriberId, WorkerStatus,
    WsEnvelope,
};
pub use types::{
    Candidate, EntityTypeTag, ExtractedEntity, ExtractionAction, ExtractionStep, Item, LogEntry,
    Match, Site, SiteConfig,
};
pub use worker::{WorkerOrchestrator, WorkerRunSummary};
