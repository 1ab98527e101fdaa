//! Source adapters for the academic repositories
//!
//! Every repository is reached through the [`SourceAdapter`] trait. An
//! adapter performs exactly one network request per call and never touches
//! the store; pagination, rate limiting, retries and persistence belong to
//! the crawl engine.
//!
//! # Adapters
//!
//! - [`AcmSource`] - ACM Digital Library HTML search
//! - [`ArxivSource`] - arXiv HTML search
//! - [`IeeeSource`] - IEEE Xplore JSON search, embedded document metadata
//! - [`ScienceDirectSource`] - ScienceDirect HTML search
//! - [`SpringerSource`] - SpringerLink HTML search (conference papers)
//! - [`MockSource`] - scripted adapter for tests and demos

mod acm;
mod arxiv;
mod html;
mod http;
mod ieee;
pub mod mock;
mod science_direct;
mod springer;

pub use acm::AcmSource;
pub use arxiv::ArxivSource;
pub use http::{build_http_client, HttpFetcher};
pub use ieee::IeeeSource;
pub use mock::MockSource;
pub use science_direct::ScienceDirectSource;
pub use springer::SpringerSource;

use crate::config::{Config, SourceConfig};
use crate::model::{PageCursor, RawRecord, RequiredField, SearchResultPage, SourceId};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

/// Errors an adapter can report for a single request
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdapterError {
    #[error("Network error requesting {url}: {message}")]
    Network { url: String, message: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("Missing required fields [{}] on {url}", join_fields(.fields))]
    MissingFields {
        url: String,
        fields: Vec<RequiredField>,
    },
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AdapterError {
    /// Returns true if repeating the same request may succeed
    ///
    /// Transport failures, timeouts and non-2xx statuses are transient; a
    /// response that parsed but did not contain what was expected is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Status { .. }
        )
    }
}

/// Contract every repository adapter implements
#[async_trait]
pub trait SourceAdapter: Send + Sync + std::fmt::Debug {
    /// The repository this adapter talks to
    fn id(&self) -> SourceId;

    /// Fetches one page of search results
    ///
    /// Issues a single request for the page the cursor points at and reports
    /// the detail links on it plus whether another page follows.
    async fn fetch_result_page(
        &self,
        query: &str,
        cursor: &PageCursor,
    ) -> Result<SearchResultPage, AdapterError>;

    /// Fetches one detail page and extracts a complete record
    ///
    /// Returns `AdapterError::MissingFields` rather than a partial record
    /// when the natural key, title or url cannot be found.
    async fn fetch_detail(&self, url: &str) -> Result<RawRecord, AdapterError>;

    /// Acquires per-crawl resources, called once before the first page
    async fn begin_session(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Releases per-crawl resources, called once when the crawl ends for any reason
    async fn end_session(&self) {}
}

/// Rejects a raw record that lacks any required field
pub(crate) fn ensure_complete(raw: RawRecord, url: &str) -> Result<RawRecord, AdapterError> {
    let fields = raw.missing_fields();
    if fields.is_empty() {
        Ok(raw)
    } else {
        Err(AdapterError::MissingFields {
            url: url.to_string(),
            fields,
        })
    }
}

/// Fetcher against a local mock server, shared by the adapter tests
#[cfg(test)]
pub(crate) fn test_fetcher(base_url: &str) -> HttpFetcher {
    let user_agent = crate::config::UserAgentConfig {
        crawler_name: "TestCrawler".to_string(),
        crawler_version: "1.0".to_string(),
        contact_url: "https://example.com/about".to_string(),
        contact_email: "admin@example.com".to_string(),
    };
    let client = build_http_client(&user_agent, std::time::Duration::from_secs(5))
        .expect("client builds");
    HttpFetcher::new(client, base_url).expect("valid base url")
}

/// Builds the adapter for one source
///
/// # Arguments
///
/// * `id` - Which repository to build an adapter for
/// * `config` - The source's resolved settings (base URL override)
/// * `client` - Shared HTTP client
pub fn build_adapter(
    id: SourceId,
    config: &SourceConfig,
    client: Client,
) -> crate::Result<Arc<dyn SourceAdapter>> {
    let base_url = config.base_url.as_deref();

    let adapter: Arc<dyn SourceAdapter> = match id {
        SourceId::Acm => Arc::new(AcmSource::new(HttpFetcher::new(
            client,
            base_url.unwrap_or(acm::DEFAULT_BASE_URL),
        )?)),
        SourceId::Arxiv => Arc::new(ArxivSource::new(HttpFetcher::new(
            client,
            base_url.unwrap_or(arxiv::DEFAULT_BASE_URL),
        )?)),
        SourceId::Ieee => Arc::new(IeeeSource::new(HttpFetcher::new(
            client,
            base_url.unwrap_or(ieee::DEFAULT_BASE_URL),
        )?)),
        SourceId::ScienceDirect => Arc::new(ScienceDirectSource::new(HttpFetcher::new(
            client,
            base_url.unwrap_or(science_direct::DEFAULT_BASE_URL),
        )?)),
        SourceId::SpringerLink => Arc::new(SpringerSource::new(HttpFetcher::new(
            client,
            base_url.unwrap_or(springer::DEFAULT_BASE_URL),
        )?)),
    };

    Ok(adapter)
}

/// Builds adapters for every enabled source, sharing one HTTP client
pub fn build_adapters(config: &Config) -> crate::Result<Vec<Arc<dyn SourceAdapter>>> {
    let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;

    config
        .enabled_sources()
        .into_iter()
        .map(|id| build_adapter(id, &config.source(id), client.clone()))
        .collect()
}
