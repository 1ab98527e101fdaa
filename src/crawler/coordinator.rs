//! Orchestrator - runs one crawl loop per source, concurrently
//!
//! This module handles:
//! - Registering adapters with their rate limiters and page sizes
//! - Fanning a query out to the requested sources
//! - Recording a crawl run per source in the store
//! - Collecting per-source reports into a `CrawlReport`

use crate::config::Config;
use crate::crawler::crawl_loop::{CrawlLoop, SourceReport};
use crate::crawler::gate::PersistenceGate;
use crate::crawler::limiter::RateLimiters;
use crate::crawler::retry::RetryPolicy;
use crate::model::SourceId;
use crate::sources::{build_adapters, SourceAdapter};
use crate::state::CrawlState;
use crate::storage::{RecordStore, RunStatus};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Results of one query across every requested source
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub query: String,
    pub sources: BTreeMap<SourceId, SourceReport>,
}

impl CrawlReport {
    /// Records found across all sources
    pub fn total_records(&self) -> usize {
        self.sources.values().map(|report| report.count).sum()
    }

    /// True if every source finished in `Done`
    pub fn is_complete(&self) -> bool {
        self.sources.values().all(SourceReport::is_success)
    }

    /// Sources that ended in the given state
    pub fn sources_in(&self, state: CrawlState) -> Vec<SourceId> {
        self.sources
            .values()
            .filter(|report| report.state == state)
            .map(|report| report.source)
            .collect()
    }
}

/// Main crawl orchestration structure
pub struct Orchestrator {
    loops: BTreeMap<SourceId, CrawlLoop>,
    limiters: RateLimiters,
    retry: RetryPolicy,
    gate: PersistenceGate,
    config_hash: String,
}

impl Orchestrator {
    /// Creates an orchestrator with no adapters registered
    ///
    /// # Arguments
    ///
    /// * `store` - Where every loop persists its records and runs
    /// * `retry` - Retry policy shared by all loops
    pub fn new(store: Arc<dyn RecordStore>, retry: RetryPolicy) -> Self {
        Self {
            loops: BTreeMap::new(),
            limiters: RateLimiters::new(),
            retry,
            gate: PersistenceGate::new(store),
            config_hash: String::new(),
        }
    }

    /// Tags every crawl run recorded by this orchestrator with a config hash
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Builds an orchestrator with an adapter for every enabled source
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Every enabled source registered
    /// * `Err(BiblioError)` - The HTTP client or an adapter could not be built
    pub fn from_config(config: &Config, store: Arc<dyn RecordStore>) -> crate::Result<Self> {
        let mut orchestrator = Self::new(store, RetryPolicy::from_config(&config.crawler));

        for adapter in build_adapters(config)? {
            let settings = config.source(adapter.id());
            orchestrator.register(adapter, settings.page_size, settings.min_interval());
        }

        Ok(orchestrator)
    }

    /// Registers an adapter, replacing any previous one for the same source
    ///
    /// Re-registering a source keeps its rate limiter, so requests stay spaced
    /// across the swap.
    pub fn register(
        &mut self,
        adapter: Arc<dyn SourceAdapter>,
        page_size: u32,
        min_interval: Duration,
    ) {
        let source = adapter.id();
        let limiter = self.limiters.get_or_insert(source, min_interval);
        let crawl = CrawlLoop::new(adapter, limiter, self.retry, self.gate.clone(), page_size);

        self.loops.insert(source, crawl);
    }

    /// Sources with a registered adapter
    pub fn sources(&self) -> Vec<SourceId> {
        self.loops.keys().copied().collect()
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        self.gate.store()
    }

    /// Crawls `query` on every requested source concurrently
    ///
    /// An empty `sources` slice means all five sources. A source that fails
    /// never stops its siblings; a requested source without an adapter is
    /// reported as `Failed`.
    pub async fn run(
        &self,
        query: &str,
        sources: &[SourceId],
        cancel: &CancellationToken,
    ) -> CrawlReport {
        let requested: BTreeSet<SourceId> = if sources.is_empty() {
            SourceId::ALL.into_iter().collect()
        } else {
            sources.iter().copied().collect()
        };

        tracing::info!(
            "Crawling {} sources for \"{}\"",
            requested.len(),
            query
        );

        let crawls = requested.iter().map(|&source| {
            let span = tracing::info_span!("crawl", source = %source, query = %query);
            self.crawl_source(source, query, cancel).instrument(span)
        });

        let sources = join_all(crawls)
            .await
            .into_iter()
            .map(|report| (report.source, report))
            .collect();

        CrawlReport {
            query: query.to_string(),
            sources,
        }
    }

    async fn crawl_source(
        &self,
        source: SourceId,
        query: &str,
        cancel: &CancellationToken,
    ) -> SourceReport {
        let Some(crawl) = self.loops.get(&source) else {
            tracing::error!("{}: no adapter registered", source);
            return SourceReport::failed(source, "no adapter registered");
        };

        let store = self.gate.store();
        let run_id = match store.create_run(source, query, &self.config_hash) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("{}: could not record crawl run: {}", source, e);
                None
            }
        };

        let report = crawl.run(query, cancel).await;

        if let Some(run_id) = run_id {
            let status = RunStatus::from_crawl_state(report.state);
            if let Err(e) = store.finish_run(run_id, status, &report.stats, report.error.as_deref())
            {
                tracing::warn!("{}: could not finish crawl run {}: {}", source, run_id, e);
            }
        }

        match report.state {
            CrawlState::Done => tracing::info!("{}: {} articles", source, report.count),
            state => tracing::warn!("{}: {} articles ({})", source, report.count, state),
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::make_record;
    use crate::sources::{AdapterError, MockSource};
    use crate::storage::SqliteStorage;

    fn retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
        }
    }

    fn orchestrator() -> Orchestrator {
        let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
        Orchestrator::new(store, retry()).with_config_hash("abc123")
    }

    fn one_page(source: SourceId, keys: &[&str]) -> Arc<MockSource> {
        let records = keys
            .iter()
            .map(|key| make_record(source, key, &format!("Title {}", key)))
            .collect();
        Arc::new(MockSource::new(source).with_records_page(records, false))
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_requested_sources() {
        let mut orchestrator = orchestrator();
        orchestrator.register(one_page(SourceId::Acm, &["a1", "a2"]), 10, Duration::from_millis(100));
        orchestrator.register(one_page(SourceId::Arxiv, &["x1"]), 10, Duration::from_millis(100));

        let report = orchestrator
            .run("kubernetes", &[SourceId::Acm, SourceId::Arxiv], &CancellationToken::new())
            .await;

        assert_eq!(report.query, "kubernetes");
        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.sources[&SourceId::Acm].count, 2);
        assert_eq!(report.sources[&SourceId::Arxiv].count, 1);
        assert_eq!(report.total_records(), 3);
        assert!(report.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_selection_means_all_sources() {
        let mut orchestrator = orchestrator();
        orchestrator.register(one_page(SourceId::Ieee, &["i1"]), 10, Duration::from_millis(100));

        let report = orchestrator.run("q", &[], &CancellationToken::new()).await;

        assert_eq!(report.sources.len(), 5);
        assert_eq!(report.sources[&SourceId::Ieee].state, CrawlState::Done);
        // Sources without an adapter fail without touching the others
        assert_eq!(report.sources_in(CrawlState::Failed).len(), 4);
        assert!(!report.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_source_does_not_cancel_siblings() {
        let mut orchestrator = orchestrator();
        let broken = Arc::new(
            MockSource::new(SourceId::Acm)
                .with_endless_pages()
                .fail_page_always(0, AdapterError::Status {
                    status: 500,
                    url: "acm".to_string(),
                }),
        );
        orchestrator.register(broken, 10, Duration::from_millis(100));
        orchestrator.register(one_page(SourceId::SpringerLink, &["s1", "s2"]), 10, Duration::from_millis(100));

        let report = orchestrator
            .run("q", &[SourceId::Acm, SourceId::SpringerLink], &CancellationToken::new())
            .await;

        assert_eq!(report.sources[&SourceId::Acm].state, CrawlState::Failed);
        assert_eq!(report.sources[&SourceId::SpringerLink].state, CrawlState::Done);
        assert_eq!(report.sources[&SourceId::SpringerLink].count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crawl_runs_are_recorded() {
        let mut orchestrator = orchestrator();
        orchestrator.register(one_page(SourceId::ScienceDirect, &["d1"]), 10, Duration::from_millis(100));

        orchestrator
            .run("serverless", &[SourceId::ScienceDirect], &CancellationToken::new())
            .await;

        let runs = orchestrator.store().latest_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].source, SourceId::ScienceDirect);
        assert_eq!(runs[0].query, "serverless");
        assert_eq!(runs[0].config_hash, "abc123");
        assert_eq!(runs[0].status, RunStatus::Done);
        assert_eq!(runs[0].stats.inserted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregistering_replaces_adapter() {
        let mut orchestrator = orchestrator();
        orchestrator.register(one_page(SourceId::Acm, &["a1"]), 10, Duration::from_secs(1));
        orchestrator.register(one_page(SourceId::Acm, &["a2"]), 10, Duration::from_secs(1));

        assert_eq!(orchestrator.sources(), vec![SourceId::Acm]);

        let report = orchestrator
            .run("q", &[SourceId::Acm], &CancellationToken::new())
            .await;
        let keys: Vec<_> = report.sources[&SourceId::Acm]
            .records
            .iter()
            .map(|r| r.natural_key.clone())
            .collect();
        assert_eq!(keys, vec!["a2"]);
    }
}
