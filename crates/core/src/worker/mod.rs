//! Worker orchestrator: the critical per-run algorithm. A single
//! non-generic `run` method, imperative `for`/`continue`/`break` rather than
//! iterator-combinator chains, and strictly no intra-run parallelism — one
//! item, one site, one candidate at a time, so the scrape stays polite and
//! the LLM queue depth never exceeds 1.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::entities::EntityExtractor;
use crate::fanout::NotificationFanout;
use crate::fuzzy::FuzzyScorer;
use crate::metrics::{WORKER_MATCHES_FOUND, WORKER_RUNS_TOTAL, WORKER_RUN_DURATION, WORKER_SITES_FAILED};
use crate::sites::{MagnetExtractor, SiteAdapter};
use crate::store::{ItemStore, MatchStore, SiteStore};
use crate::textgate::{contains_as_phrase, disqualify, extract_year, remove_year};
use crate::types::{entity_type_is_file_size, entity_type_is_film_title, entity_type_is_year};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerRunSummary {
    pub items_processed: usize,
    pub matches_found: usize,
    pub sites_failed: usize,
}

pub struct WorkerOrchestrator {
    item_store: Arc<dyn ItemStore>,
    site_store: Arc<dyn SiteStore>,
    site_adapter: Arc<dyn SiteAdapter>,
    magnet_extractor: Arc<dyn MagnetExtractor>,
    entity_extractor: Option<Arc<dyn EntityExtractor>>,
    fuzzy_scorer: FuzzyScorer,
    match_store: Arc<dyn MatchStore>,
    fanout: Arc<NotificationFanout>,
    config: WorkerConfig,
}

impl WorkerOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        item_store: Arc<dyn ItemStore>,
        site_store: Arc<dyn SiteStore>,
        site_adapter: Arc<dyn SiteAdapter>,
        magnet_extractor: Arc<dyn MagnetExtractor>,
        entity_extractor: Option<Arc<dyn EntityExtractor>>,
        match_store: Arc<dyn MatchStore>,
        fanout: Arc<NotificationFanout>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            item_store,
            site_store,
            site_adapter,
            magnet_extractor,
            entity_extractor,
            fuzzy_scorer: FuzzyScorer,
            match_store,
            fanout,
            config,
        }
    }

    pub async fn run(&self) -> WorkerRunSummary {
        let start = Instant::now();
        let summary = self.run_inner().await;

        WORKER_RUN_DURATION
            .with_label_values(&[])
            .observe(start.elapsed().as_secs_f64());
        WORKER_MATCHES_FOUND
            .with_label_values(&[])
            .observe(summary.matches_found as f64);
        WORKER_SITES_FAILED
            .with_label_values(&[])
            .observe(summary.sites_failed as f64);
        WORKER_RUNS_TOTAL.with_label_values(&["completed"]).inc();

        summary
    }

    async fn run_inner(&self) -> WorkerRunSummary {
        let mut summary = WorkerRunSummary::default();

        let mut items = match self.item_store.list().await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "failed to list items for worker run");
                return summary;
            }
        };
        items.sort_by_key(|i| i.id);

        let mut sites = match self.site_store.list().await {
            Ok(sites) => sites,
            Err(e) => {
                warn!(error = %e, "failed to list sites for worker run");
                return summary;
            }
        };
        sites.sort_by_key(|s| s.id);

        for item in &items {
            summary.items_processed += 1;
            let mut matches_found = 0usize;

            for site in &sites {
                if matches_found >= self.config.per_item_cap {
                    break;
                }

                let candidates = match self.site_adapter.search(site, &item.text).await {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        summary.sites_failed += 1;
                        warn!(site_id = site.id, error = %e, "site search failed");
                        continue;
                    }
                };

                for candidate in &candidates {
                    if matches_found >= self.config.per_item_cap {
                        break;
                    }

                    // (1) quality gate
                    if disqualify(&candidate.title) {
                        continue;
                    }

                    // (2) contiguous-phrase pre-filter
                    let item_label_no_year = remove_year(&item.text);
                    if !contains_as_phrase(&candidate.title, &item_label_no_year) {
                        continue;
                    }

                    // (3) entity extraction (optional)
                    let mut matched = false;
                    let mut entities = Vec::new();
                    let mut decided = false;

                    if let Some(extractor) = &self.entity_extractor {
                        entities = extractor.extract(&candidate.title).await.unwrap_or_default();

                        let film_title = entities.iter().find(|e| entity_type_is_film_title(&e.entity_type));
                        let year_entity = entities.iter().find(|e| entity_type_is_year(&e.entity_type));

                        if let Some(film_title) = film_title {
                            decided = true;
                            let expected_title =
                                remove_year(&item.text).trim().to_lowercase();
                            let candidate_title = film_title.text.trim().to_lowercase();

                            if expected_title == candidate_title {
                                match extract_year(&item.text) {
                                    None => matched = true,
                                    Some(item_year) => match year_entity {
                                        Some(year) if year.text == item_year => matched = true,
                                        _ => continue,
                                    },
                                }
                            } else {
                                continue;
                            }
                        }
                    }

                    // (4) fuzzy fallback (only when entity path did not decide)
                    if !decided && !matched {
                        if self.fuzzy_scorer.score(&item.text, &candidate.title)
                            >= self.config.fuzzy_threshold
                        {
                            matched = true;
                        }
                    }

                    if !matched {
                        continue;
                    }

                    // (5) magnet extraction for confirmed match
                    let magnet = self.magnet_extractor.extract(&candidate.url).await;

                    // fileSize is denormalized from the FILE_SIZE entity when present.
                    let file_size = entities
                        .iter()
                        .find(|e| entity_type_is_file_size(&e.entity_type))
                        .map(|e| e.text.clone());

                    let entities_opt = if entities.is_empty() {
                        None
                    } else {
                        Some(entities.as_slice())
                    };

                    // (6) dedup insert + fan-out
                    let outcome = match self
                        .match_store
                        .insert(
                            item.id,
                            &candidate.title,
                            &candidate.url,
                            site.name(),
                            magnet.as_deref(),
                            file_size.as_deref(),
                            entities_opt,
                        )
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(item_id = item.id, error = %e, "failed to persist match");
                            continue;
                        }
                    };

                    if outcome.inserted {
                        matches_found += 1;
                        summary.matches_found += 1;

                        if let Some(id) = outcome.id {
                            let record = crate::types::Match {
                                id,
                                item_id: item.id,
                                matched_title: candidate.title.clone(),
                                matched_url: candidate.url.clone(),
                                source_site: site.name().to_string(),
                                magnet_uri: magnet.clone(),
                                file_size: file_size.clone(),
                                entities: if entities.is_empty() { None } else { Some(entities.clone()) },
                                created: chrono::Utc::now(),
                            };
                            self.fanout.on_new_match(item, candidate, site, record).await;
                        }
                    }
                }
            }

            info!(item_id = item.id, matches_found, "item processing complete");
            self.fanout.on_item_complete(item, matches_found).await;
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::entities::{ExtractError, StaticEntityExtractor};
    use crate::fanout::NotificationFanout;
    use crate::sites::{FixtureMagnetExtractor, FixtureSiteAdapter, SiteError};
    use crate::store::SqliteStore;
    use crate::subscribers::{LiveSubscriber, LiveSubscriberRegistry, SubscriberId, WsEnvelope};
    use crate::types::{Candidate, ExtractedEntity};

    /// Every scenario shares a fresh in-memory store, a single "Dune 2021"
    /// item, and a single site; only the site adapter, entity extractor and
    /// magnet extractor vary.
    struct Harness {
        store: Arc<SqliteStore>,
        item_id: i64,
    }

    impl Harness {
        async fn new() -> Self {
            let store = Arc::new(SqliteStore::in_memory().unwrap());
            let item_id = ItemStore::insert(&*store, "Dune 2021").await.unwrap();
            SiteStore::insert(&*store, "https://site1.test", None, None)
                .await
                .unwrap();
            Self { store, item_id }
        }

        fn orchestrator(
            &self,
            site_adapter: Arc<dyn SiteAdapter>,
            magnet_extractor: Arc<dyn MagnetExtractor>,
            entity_extractor: Option<Arc<dyn EntityExtractor>>,
            fanout: Arc<NotificationFanout>,
            config: WorkerConfig,
        ) -> WorkerOrchestrator {
            WorkerOrchestrator::new(
                self.store.clone() as Arc<dyn ItemStore>,
                self.store.clone() as Arc<dyn SiteStore>,
                site_adapter,
                magnet_extractor,
                entity_extractor,
                self.store.clone() as Arc<dyn MatchStore>,
                fanout,
                config,
            )
        }

        fn fanout(&self) -> Arc<NotificationFanout> {
            Arc::new(NotificationFanout::new(
                Arc::new(LiveSubscriberRegistry::new()),
                self.store.clone() as Arc<dyn crate::store::LogStore>,
                None,
            ))
        }
    }

    fn entity(text: &str, entity_type: &str) -> ExtractedEntity {
        ExtractedEntity {
            text: text.to_string(),
            entity_type: entity_type.to_string(),
            confidence: 0.9,
        }
    }

    struct CountingEntityExtractor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EntityExtractor for CountingEntityExtractor {
        async fn extract(&self, _title: &str) -> Result<Vec<ExtractedEntity>, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    struct RecordingSubscriber {
        id: SubscriberId,
        received: Mutex<Vec<WsEnvelope>>,
    }

    #[async_trait]
    impl LiveSubscriber for RecordingSubscriber {
        async fn send(&self, envelope: &WsEnvelope) -> Result<(), ()> {
            self.received.lock().unwrap().push(envelope.clone());
            Ok(())
        }

        fn id(&self) -> SubscriberId {
            self.id
        }
    }

    /// A per-site-URL canned candidate list, for the per-item-cap scenario
    /// where different sites must yield different candidates.
    struct MultiSiteAdapter {
        by_url: HashMap<String, Vec<Candidate>>,
    }

    #[async_trait]
    impl SiteAdapter for MultiSiteAdapter {
        async fn search(&self, site: &crate::types::Site, _query: &str) -> Result<Vec<Candidate>, SiteError> {
            Ok(self.by_url.get(&site.url).cloned().unwrap_or_default())
        }
    }

    fn candidate(title: &str, url: &str) -> Candidate {
        Candidate {
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    // Scenario 1: exact entity match accepts.
    #[tokio::test]
    async fn exact_entity_match_accepts_and_extracts_magnet() {
        let harness = Harness::new().await;
        let site_adapter = Arc::new(FixtureSiteAdapter::new(vec![candidate(
            "Dune.2021.1080p.BluRay.x264",
            "https://site1.test/t/1",
        )]));
        let magnet_extractor = Arc::new(FixtureMagnetExtractor::new(Some(
            "magnet:?xt=urn:btih:abc".to_string(),
        )));
        let entity_extractor: Arc<dyn EntityExtractor> = Arc::new(StaticEntityExtractor::ok(vec![
            entity("Dune", "FILM_TITLE"),
            entity("2021", "YEAR"),
        ]));

        let orchestrator = harness.orchestrator(
            site_adapter,
            magnet_extractor,
            Some(entity_extractor),
            harness.fanout(),
            WorkerConfig::default(),
        );

        let summary = orchestrator.run().await;
        assert_eq!(summary.matches_found, 1);

        let matches = MatchStore::list_recent(&*harness.store, 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].magnet_uri.as_deref(), Some("magnet:?xt=urn:btih:abc"));
    }

    // Scenario 2: year mismatch rejects even though the title matches, and
    // the fuzzy fallback (which would otherwise accept) is never consulted.
    #[tokio::test]
    async fn year_mismatch_rejects_without_fuzzy_fallback() {
        let harness = Harness::new().await;
        let site_adapter = Arc::new(FixtureSiteAdapter::new(vec![candidate(
            "Dune 2021 1080p BluRay",
            "https://site1.test/t/1",
        )]));
        let entity_extractor: Arc<dyn EntityExtractor> = Arc::new(StaticEntityExtractor::ok(vec![
            entity("Dune", "FILM_TITLE"),
            entity("1984", "YEAR"),
        ]));

        let orchestrator = harness.orchestrator(
            site_adapter,
            Arc::new(FixtureMagnetExtractor::new(None)),
            Some(entity_extractor),
            harness.fanout(),
            WorkerConfig::default(),
        );

        let summary = orchestrator.run().await;
        assert_eq!(summary.matches_found, 0);
        assert!(MatchStore::list_recent(&*harness.store, 10).await.unwrap().is_empty());
    }

    // Scenario 3: the quality disqualifier short-circuits before any LLM call.
    #[tokio::test]
    async fn disqualified_candidate_never_reaches_entity_extraction() {
        let harness = Harness::new().await;
        let site_adapter = Arc::new(FixtureSiteAdapter::new(vec![candidate(
            "Dune.2021.TS.XviD",
            "https://site1.test/t/1",
        )]));
        let calls = Arc::new(AtomicUsize::new(0));
        let entity_extractor: Arc<dyn EntityExtractor> =
            Arc::new(CountingEntityExtractor { calls: calls.clone() });

        let orchestrator = harness.orchestrator(
            site_adapter,
            Arc::new(FixtureMagnetExtractor::new(None)),
            Some(entity_extractor),
            harness.fanout(),
            WorkerConfig::default(),
        );

        let summary = orchestrator.run().await;
        assert_eq!(summary.matches_found, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(MatchStore::list_recent(&*harness.store, 10).await.unwrap().is_empty());
    }

    // Scenario 4: re-running against the same candidate is a no-op for
    // persistence and for fan-out (no second `new_match` broadcast).
    #[tokio::test]
    async fn duplicate_insert_is_a_fanout_no_op_on_second_run() {
        let harness = Harness::new().await;
        let site_adapter = Arc::new(FixtureSiteAdapter::new(vec![candidate(
            "Dune 2021 1080p BluRay",
            "https://site1.test/t/1",
        )]));

        let registry = Arc::new(LiveSubscriberRegistry::new());
        let subscriber = Arc::new(RecordingSubscriber {
            id: 1,
            received: Mutex::new(vec![]),
        });
        registry.register(subscriber.clone());
        let fanout = Arc::new(NotificationFanout::new(
            registry,
            harness.store.clone() as Arc<dyn crate::store::LogStore>,
            None,
        ));

        let orchestrator = harness.orchestrator(
            site_adapter.clone(),
            Arc::new(FixtureMagnetExtractor::new(None)),
            None,
            fanout.clone(),
            WorkerConfig::default(),
        );

        let first = orchestrator.run().await;
        assert_eq!(first.matches_found, 1);

        let second = orchestrator.run().await;
        assert_eq!(second.matches_found, 0);

        assert_eq!(MatchStore::list_recent(&*harness.store, 10).await.unwrap().len(), 1);

        let new_match_events = subscriber
            .received
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, WsEnvelope::NewMatch { .. }))
            .count();
        assert_eq!(new_match_events, 1);
    }

    // Scenario 5: per-item cap of 5 stops persistence even with 7 qualifying
    // candidates spread across 3 sites.
    #[tokio::test]
    async fn per_item_cap_stops_at_five_matches() {
        let harness = Harness::new().await;
        SiteStore::insert(&*harness.store, "https://site2.test", None, None)
            .await
            .unwrap();
        SiteStore::insert(&*harness.store, "https://site3.test", None, None)
            .await
            .unwrap();

        let mut by_url = HashMap::new();
        by_url.insert(
            "https://site1.test".to_string(),
            vec![
                candidate("Dune 2021 copy one", "https://site1.test/t/1"),
                candidate("Dune 2021 copy two", "https://site1.test/t/2"),
                candidate("Dune 2021 copy three", "https://site1.test/t/3"),
            ],
        );
        by_url.insert(
            "https://site2.test".to_string(),
            vec![
                candidate("Dune 2021 copy four", "https://site2.test/t/1"),
                candidate("Dune 2021 copy five", "https://site2.test/t/2"),
                candidate("Dune 2021 copy six", "https://site2.test/t/3"),
            ],
        );
        by_url.insert(
            "https://site3.test".to_string(),
            vec![candidate("Dune 2021 copy seven", "https://site3.test/t/1")],
        );

        let orchestrator = harness.orchestrator(
            Arc::new(MultiSiteAdapter { by_url }),
            Arc::new(FixtureMagnetExtractor::new(None)),
            None,
            harness.fanout(),
            WorkerConfig::default(),
        );

        let summary = orchestrator.run().await;
        assert_eq!(summary.matches_found, 5);
        assert_eq!(MatchStore::list_recent(&*harness.store, 10).await.unwrap().len(), 5);

        let logs = crate::store::LogStore::list_page(&*harness.store, 1, 25).await.unwrap();
        assert_eq!(logs.logs.len(), 1);
        assert!(logs.logs[0].success);
    }

    // Scenario 6: the LLM is down (entity extraction always fails), so the
    // worker degrades to the fuzzy fallback and still accepts a good match.
    #[tokio::test]
    async fn llm_down_degrades_to_fuzzy_fallback() {
        let harness = Harness::new().await;
        let site_adapter = Arc::new(FixtureSiteAdapter::new(vec![candidate(
            "dune 2021 1080p",
            "https://site1.test/t/1",
        )]));
        let entity_extractor: Arc<dyn EntityExtractor> = Arc::new(StaticEntityExtractor::failing());

        let orchestrator = harness.orchestrator(
            site_adapter,
            Arc::new(FixtureMagnetExtractor::new(None)),
            Some(entity_extractor),
            harness.fanout(),
            WorkerConfig {
                fuzzy_threshold: 0.78,
                ..WorkerConfig::default()
            },
        );

        let summary = orchestrator.run().await;
        assert_eq!(summary.matches_found, 1);

        let matches = MatchStore::list_recent(&*harness.store, 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].entities.is_none());
    }
}
