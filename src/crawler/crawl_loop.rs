//! The per-source crawl loop
//!
//! One loop walks one source's result pages for one query:
//!
//! ```text
//! FetchPage -> FetchDetail -> Persist -> FetchDetail ... -> FetchPage ... -> Done
//! ```
//!
//! A page that cannot be fetched ends the loop in `Failed`. A detail that
//! cannot be fetched, or a record that cannot be stored, is logged, counted
//! and skipped. Cancellation ends the loop in `Cancelled` with whatever has
//! been collected so far.

use crate::crawler::gate::{GateError, PersistOutcome, PersistenceGate};
use crate::crawler::limiter::RateLimiter;
use crate::crawler::retry::{RetryError, RetryPolicy};
use crate::model::{PageCursor, Record, SourceId};
use crate::sources::SourceAdapter;
use crate::state::{CrawlState, CrawlStats};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one source's crawl
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceId,
    /// Terminal state the loop ended in
    pub state: CrawlState,
    /// Number of records in `records`
    pub count: usize,
    /// Records found, newly inserted or already stored, in crawl order
    pub records: Vec<Record>,
    pub stats: CrawlStats,
    /// Why the loop failed, if it did
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source: SourceId) -> Self {
        Self {
            source,
            state: CrawlState::FetchPage,
            count: 0,
            records: Vec::new(),
            stats: CrawlStats::default(),
            error: None,
        }
    }

    /// A report for a source that could not be crawled at all
    pub fn failed(source: SourceId, error: impl Into<String>) -> Self {
        Self {
            state: CrawlState::Failed,
            error: Some(error.into()),
            ..Self::new(source)
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == CrawlState::Done
    }

    fn push(&mut self, record: Record) {
        self.records.push(record);
        self.count = self.records.len();
    }
}

/// Everything one source's loop needs
#[derive(Clone)]
pub struct CrawlLoop {
    adapter: Arc<dyn SourceAdapter>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    gate: PersistenceGate,
    page_size: u32,
}

impl CrawlLoop {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        gate: PersistenceGate,
        page_size: u32,
    ) -> Self {
        Self {
            adapter,
            limiter,
            retry,
            gate,
            page_size: page_size.max(1),
        }
    }

    pub fn source(&self) -> SourceId {
        self.adapter.id()
    }

    /// Crawls every result page of `query` and persists what it finds
    ///
    /// The adapter's session is released before returning, however the
    /// loop ended.
    pub async fn run(&self, query: &str, cancel: &CancellationToken) -> SourceReport {
        let source = self.source();
        let mut report = SourceReport::new(source);

        let state = match self.adapter.begin_session().await {
            Ok(()) => self.crawl(query, cancel, &mut report).await,
            Err(e) => {
                tracing::error!("{}: failed to start session: {}", source, e);
                report.error = Some(format!("session start failed: {}", e));
                CrawlState::Failed
            }
        };

        self.adapter.end_session().await;

        report.state = state;
        report
    }

    async fn crawl(
        &self,
        query: &str,
        cancel: &CancellationToken,
        report: &mut SourceReport,
    ) -> CrawlState {
        let source = self.source();
        let adapter = &self.adapter;
        let limiter = &self.limiter;

        let mut state = CrawlState::FetchPage;
        let mut cursor = PageCursor::new(source, query, self.page_size);

        loop {
            let page_cursor = &cursor;
            let fetched = self
                .retry
                .run(cancel, move || async move {
                    limiter.acquire().await;
                    adapter.fetch_result_page(query, page_cursor).await
                })
                .await;

            let page = match fetched {
                Ok(page) => page,
                Err(RetryError::Cancelled) => return advance(state, CrawlState::Cancelled, source),
                Err(e) => {
                    tracing::error!("{}: result page {} failed: {}", source, cursor.page_index, e);
                    report.error = Some(format!("result page {}: {}", cursor.page_index, e));
                    return advance(state, CrawlState::Failed, source);
                }
            };

            report.stats.pages_fetched += 1;
            tracing::debug!(
                "{}: page {} lists {} records (more: {})",
                source,
                cursor.page_index,
                page.detail_links.len(),
                page.has_next
            );

            for link in &page.detail_links {
                state = advance(state, CrawlState::FetchDetail, source);

                let fetched = self
                    .retry
                    .run(cancel, move || async move {
                        limiter.acquire().await;
                        adapter.fetch_detail(link).await
                    })
                    .await;

                let raw = match fetched {
                    Ok(raw) => raw,
                    Err(RetryError::Cancelled) => {
                        return advance(state, CrawlState::Cancelled, source)
                    }
                    Err(RetryError::Exhausted { attempts, last }) => {
                        tracing::warn!(
                            "{}: skipping {} after {} attempts: {}",
                            source,
                            link,
                            attempts,
                            last
                        );
                        report.stats.exhausted += 1;
                        continue;
                    }
                    Err(RetryError::Permanent(e)) => {
                        tracing::warn!("{}: skipping {}: {}", source, link, e);
                        report.stats.skipped += 1;
                        continue;
                    }
                };

                report.stats.details_fetched += 1;
                state = advance(state, CrawlState::Persist, source);

                match self.gate.persist(raw) {
                    Ok(PersistOutcome::Inserted(record)) => {
                        report.stats.inserted += 1;
                        report.push(record);
                    }
                    Ok(PersistOutcome::Duplicate(record)) => {
                        report.stats.duplicates += 1;
                        report.push(record);
                    }
                    Err(e @ GateError::Validation { .. }) => {
                        tracing::warn!("{}: rejected {}: {}", source, link, e);
                        report.stats.validation_failures += 1;
                    }
                    Err(e @ GateError::Persistence(_)) => {
                        tracing::warn!("{}: could not store {}: {}", source, link, e);
                        report.stats.persistence_failures += 1;
                    }
                }
            }

            if !page.has_next {
                return advance(state, CrawlState::Done, source);
            }

            cursor.advance();
            state = advance(state, CrawlState::FetchPage, source);
        }
    }
}

fn advance(from: CrawlState, to: CrawlState, source: SourceId) -> CrawlState {
    debug_assert!(
        from.can_transition_to(to),
        "illegal crawl transition {} -> {}",
        from,
        to
    );
    tracing::trace!("{}: {} -> {}", source, from, to);
    to
}
