//! Engine: the explicit value that owns every module-wide mutable
//! singleton — the worker flag, the subscriber registry, the LLM child
//! process handle — plus the stores and clients the worker and API layer
//! both need. Constructed once at startup and shared, via `Arc`, between
//! `main.rs`'s router wiring and the scheduler.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::config::Config;
use crate::entities::{EntityExtractor, LlmSupervisor, OllamaEntityExtractor};
use crate::fanout::{NotificationFanout, SmsClient};
use crate::scheduler::{Scheduler, TriggerOutcome, WorkerGate};
use crate::sites::{ChromiumMagnetExtractor, ChromiumSiteAdapter, MagnetExtractor, NullSiteAdapter, SiteAdapter};
use crate::store::{ItemStore, LogStore, MatchStore, SiteStore, SqliteStore, StoreError};
use crate::subscribers::LiveSubscriberRegistry;
use crate::worker::WorkerOrchestrator;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct Engine {
    store: Arc<SqliteStore>,
    registry: Arc<LiveSubscriberRegistry>,
    fanout: Arc<NotificationFanout>,
    worker: Arc<WorkerOrchestrator>,
    scheduler: Scheduler,
    llm_supervisor: Option<AsyncMutex<LlmSupervisor>>,
}

impl Engine {
    pub async fn start(config: &Config) -> Result<Arc<Self>, EngineError> {
        let store = Arc::new(SqliteStore::new(std::path::Path::new(&config.database_url))?);
        let registry = Arc::new(LiveSubscriberRegistry::new());

        let sms = if config.sms.is_complete() {
            Some(SmsClient::new(
                config.sms.twilio_account_sid.clone().unwrap(),
                config.sms.twilio_auth_token.clone().unwrap(),
                config.sms.twilio_from_number.clone().unwrap(),
                config.sms.alert_to_number.clone().unwrap(),
            ))
        } else {
            None
        };
        let fanout = Arc::new(NotificationFanout::new(
            registry.clone(),
            store.clone() as Arc<dyn LogStore>,
            sms,
        ));

        // DISABLE_PLAYWRIGHT && USE_ENTITY_MATCHING skips the LLM supervisor entirely.
        let (site_adapter, magnet_extractor, entity_extractor, llm_supervisor): (
            Arc<dyn SiteAdapter>,
            Arc<dyn MagnetExtractor>,
            Option<Arc<dyn EntityExtractor>>,
            Option<LlmSupervisor>,
        ) = if config.worker.disable_playwright {
            if config.entity_matching.enabled {
                info!("disable_playwright and entity matching both set; skipping LLM supervisor as a no-op combination");
            }
            (Arc::new(NullSiteAdapter), Arc::new(ChromiumMagnetExtractor::new()), None, None)
        } else if config.entity_matching.enabled {
            // `OLLAMA_URL`/`OLLAMA_MODEL` name the Ollama API shape (`/api/tags`,
            // `/api/generate`) per §6, so the spawned binary is Ollama's own
            // server command; there is no dedicated env var for overriding it.
            let supervisor = LlmSupervisor::start(
                &config.entity_matching.ollama_url,
                &config.entity_matching.ollama_model,
                Some("ollama serve"),
            )
            .await;
            let extractor: Arc<dyn EntityExtractor> = Arc::new(OllamaEntityExtractor::new(
                config.entity_matching.ollama_url.clone(),
                config.entity_matching.ollama_model.clone(),
            ));
            (
                Arc::new(ChromiumSiteAdapter::new()),
                Arc::new(ChromiumMagnetExtractor::new()),
                Some(extractor),
                Some(supervisor),
            )
        } else {
            (
                Arc::new(ChromiumSiteAdapter::new()),
                Arc::new(ChromiumMagnetExtractor::new()),
                None,
                None,
            )
        };

        let worker = Arc::new(WorkerOrchestrator::new(
            store.clone() as Arc<dyn ItemStore>,
            store.clone() as Arc<dyn SiteStore>,
            site_adapter,
            magnet_extractor,
            entity_extractor,
            store.clone() as Arc<dyn MatchStore>,
            fanout.clone(),
            config.worker.clone(),
        ));

        let scheduler = Scheduler::new(WorkerGate::new());
        scheduler.start(
            config.worker.check_interval_hours,
            config.worker.run_worker_on_start,
            worker.clone(),
            fanout.clone(),
        );

        Ok(Arc::new(Self {
            store,
            registry,
            fanout,
            worker,
            scheduler,
            llm_supervisor: llm_supervisor.map(AsyncMutex::new),
        }))
    }

    pub fn item_store(&self) -> Arc<dyn ItemStore> {
        self.store.clone()
    }

    pub fn site_store(&self) -> Arc<dyn SiteStore> {
        self.store.clone()
    }

    pub fn match_store(&self) -> Arc<dyn MatchStore> {
        self.store.clone()
    }

    pub fn log_store(&self) -> Arc<dyn LogStore> {
        self.store.clone()
    }

    pub fn registry(&self) -> Arc<LiveSubscriberRegistry> {
        self.registry.clone()
    }

    pub fn is_worker_running(&self) -> bool {
        self.scheduler.gate().is_running()
    }

    pub fn trigger_worker(&self) -> TriggerOutcome {
        self.scheduler
            .trigger_now(self.worker.clone(), self.fanout.clone())
    }

    /// Stops the scheduler's tick loop and kills the supervised LLM child,
    /// if one was ever spawned. Called once from `main.rs`'s graceful
    /// shutdown sequence.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown();
        if let Some(supervisor) = &self.llm_supervisor {
            supervisor.lock().await.shutdown().await;
        }
    }
}
