//! Crawl engine
//!
//! This module contains the core crawling logic, including:
//! - Per-source request spacing (`RateLimiter`)
//! - Bounded retries with exponential backoff (`RetryPolicy`)
//! - Validation and idempotent insertion (`PersistenceGate`)
//! - The per-source page/detail state machine (`CrawlLoop`)
//! - Concurrent fan-out across sources (`Orchestrator`)

mod coordinator;
mod crawl_loop;
mod gate;
mod limiter;
mod retry;

pub use coordinator::{CrawlReport, Orchestrator};
pub use crawl_loop::{CrawlLoop, SourceReport};
pub use gate::{GateError, PersistOutcome, PersistenceGate};
pub use limiter::{RateLimiter, RateLimiters};
pub use retry::{RetryError, RetryPolicy, Retryable};

use crate::config::Config;
use crate::model::SourceId;
use crate::storage::RecordStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs one query against the configured sources
///
/// This is the main entry point for a crawl. It will:
/// 1. Build an adapter for every enabled source
/// 2. Crawl the requested sources concurrently
/// 3. Record one crawl run per source in the store
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the config file, stored with each run
/// * `store` - Record store shared by every source
/// * `query` - The search query
/// * `sources` - Sources to crawl; empty means all
/// * `cancel` - Token that stops the crawl early
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished, possibly with failed sources
/// * `Err(BiblioError)` - The crawl could not be set up
pub async fn crawl(
    config: &Config,
    config_hash: &str,
    store: Arc<dyn RecordStore>,
    query: &str,
    sources: &[SourceId],
    cancel: &CancellationToken,
) -> crate::Result<CrawlReport> {
    let orchestrator = Orchestrator::from_config(config, store)?.with_config_hash(config_hash);
    Ok(orchestrator.run(query, sources, cancel).await)
}
