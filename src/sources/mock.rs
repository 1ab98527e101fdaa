//! Scripted adapter for tests and offline demos
//!
//! A `MockSource` serves result pages and detail records from memory, can
//! be told to fail specific requests a number of times, and records every
//! call it receives so tests can assert on request counts and spacing.

use crate::model::{PageCursor, RawRecord, SearchResultPage, SourceId};
use crate::sources::{ensure_complete, AdapterError, SourceAdapter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Host used for every synthetic link the mock hands out
pub const MOCK_HOST: &str = "https://mock.invalid";

#[derive(Debug, Clone)]
struct Failure {
    /// None fails forever
    remaining: Option<u32>,
    error: AdapterError,
}

impl Failure {
    /// Consumes one scripted failure, if any is left
    fn take(&mut self) -> Option<AdapterError> {
        match self.remaining.as_mut() {
            None => Some(self.error.clone()),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(self.error.clone())
            }
        }
    }
}

#[derive(Debug, Default)]
struct RequestLog {
    times: Vec<Instant>,
    pages: Vec<u32>,
    details: Vec<String>,
    sessions_begun: u32,
    sessions_ended: u32,
}

#[derive(Debug)]
pub struct MockSource {
    id: SourceId,
    pages: Vec<SearchResultPage>,
    endless: bool,
    details: HashMap<String, RawRecord>,
    latency: Option<Duration>,
    begin_failure: Option<AdapterError>,
    page_failures: Mutex<HashMap<u32, Failure>>,
    detail_failures: Mutex<HashMap<String, Failure>>,
    log: Mutex<RequestLog>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Builds a complete raw record with a deterministic detail URL
pub fn make_record(source: SourceId, key: &str, title: &str) -> RawRecord {
    RawRecord {
        natural_key: Some(key.to_string()),
        title: Some(title.to_string()),
        url: Some(detail_url(source, key)),
        record_type: Some("article".to_string()),
        authors: vec!["Jane Doe".to_string()],
        publication_date: Some("2021-06-01".to_string()),
        ..RawRecord::new(source)
    }
}

/// The detail URL `make_record` assigns to a key
pub fn detail_url(source: SourceId, key: &str) -> String {
    format!("{}/{}/{}", MOCK_HOST, source.as_str(), key)
}

impl MockSource {
    /// Creates a mock with no pages; every search returns an empty last page
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            pages: Vec::new(),
            endless: false,
            details: HashMap::new(),
            latency: None,
            begin_failure: None,
            page_failures: Mutex::new(HashMap::new()),
            detail_failures: Mutex::new(HashMap::new()),
            log: Mutex::new(RequestLog::default()),
        }
    }

    /// Appends a result page listing `links`
    pub fn with_page<I, S>(mut self, links: I, has_next: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pages.push(SearchResultPage {
            detail_links: links.into_iter().map(Into::into).collect(),
            has_next,
        });
        self
    }

    /// Appends a result page whose links resolve to the given records
    pub fn with_records_page(mut self, records: Vec<RawRecord>, has_next: bool) -> Self {
        let links: Vec<String> = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                record.url.clone().unwrap_or_else(|| {
                    format!(
                        "{}/{}/unlinked-{}-{}",
                        MOCK_HOST,
                        self.id.as_str(),
                        self.pages.len(),
                        i
                    )
                })
            })
            .collect();

        for (link, record) in links.iter().zip(records) {
            self.details.insert(link.clone(), record);
        }
        self.with_page(links, has_next)
    }

    /// Registers the record served for a detail URL
    pub fn with_detail(mut self, url: &str, raw: RawRecord) -> Self {
        self.details.insert(url.to_string(), raw);
        self
    }

    /// Serves a fresh one-link page after the scripted ones, forever
    pub fn with_endless_pages(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Delays every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fails the first `times` requests for page `page_index`
    pub fn fail_page(self, page_index: u32, times: u32, error: AdapterError) -> Self {
        self.script_page_failure(page_index, Some(times), error)
    }

    pub fn fail_page_always(self, page_index: u32, error: AdapterError) -> Self {
        self.script_page_failure(page_index, None, error)
    }

    /// Fails the first `times` requests for a detail URL
    pub fn fail_detail(self, url: &str, times: u32, error: AdapterError) -> Self {
        self.script_detail_failure(url, Some(times), error)
    }

    pub fn fail_detail_always(self, url: &str, error: AdapterError) -> Self {
        self.script_detail_failure(url, None, error)
    }

    pub fn fail_begin_session(mut self, error: AdapterError) -> Self {
        self.begin_failure = Some(error);
        self
    }

    fn script_page_failure(self, page_index: u32, remaining: Option<u32>, error: AdapterError) -> Self {
        lock(&self.page_failures).insert(page_index, Failure { remaining, error });
        self
    }

    fn script_detail_failure(self, url: &str, remaining: Option<u32>, error: AdapterError) -> Self {
        lock(&self.detail_failures).insert(url.to_string(), Failure { remaining, error });
        self
    }

    // ===== Recorded calls =====

    /// Instants at which page and detail requests arrived, in order
    pub fn request_times(&self) -> Vec<Instant> {
        lock(&self.log).times.clone()
    }

    /// Page indexes requested, in order, retries included
    pub fn page_requests(&self) -> Vec<u32> {
        lock(&self.log).pages.clone()
    }

    /// Detail URLs requested, in order, retries included
    pub fn detail_requests(&self) -> Vec<String> {
        lock(&self.log).details.clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.log).times.len()
    }

    pub fn sessions_begun(&self) -> u32 {
        lock(&self.log).sessions_begun
    }

    pub fn sessions_ended(&self) -> u32 {
        lock(&self.log).sessions_ended
    }

    async fn respond_after_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn endless_link(&self, page_index: u32) -> String {
        format!("{}/{}/endless-{}", MOCK_HOST, self.id.as_str(), page_index)
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn fetch_result_page(
        &self,
        _query: &str,
        cursor: &PageCursor,
    ) -> Result<SearchResultPage, AdapterError> {
        {
            let mut log = lock(&self.log);
            log.times.push(Instant::now());
            log.pages.push(cursor.page_index);
        }
        self.respond_after_latency().await;

        let failure = lock(&self.page_failures)
            .get_mut(&cursor.page_index)
            .and_then(Failure::take);
        if let Some(error) = failure {
            return Err(error);
        }

        let index = cursor.page_index as usize;
        if let Some(page) = self.pages.get(index) {
            let mut page = page.clone();
            // The last scripted page hands over to the endless tail
            if self.endless && index + 1 == self.pages.len() {
                page.has_next = true;
            }
            return Ok(page);
        }

        if self.endless {
            return Ok(SearchResultPage {
                detail_links: vec![self.endless_link(cursor.page_index)],
                has_next: true,
            });
        }

        Ok(SearchResultPage::default())
    }

    async fn fetch_detail(&self, url: &str) -> Result<RawRecord, AdapterError> {
        {
            let mut log = lock(&self.log);
            log.times.push(Instant::now());
            log.details.push(url.to_string());
        }
        self.respond_after_latency().await;

        let failure = lock(&self.detail_failures)
            .get_mut(url)
            .and_then(Failure::take);
        if let Some(error) = failure {
            return Err(error);
        }

        let raw = match self.details.get(url) {
            Some(raw) => raw.clone(),
            None if self.endless => {
                let key = url.rsplit('/').next().unwrap_or(url);
                RawRecord {
                    url: Some(url.to_string()),
                    ..make_record(self.id, key, &format!("Endless result {}", key))
                }
            }
            None => {
                return Err(AdapterError::Status {
                    status: 404,
                    url: url.to_string(),
                })
            }
        };

        ensure_complete(raw, url)
    }

    async fn begin_session(&self) -> Result<(), AdapterError> {
        lock(&self.log).sessions_begun += 1;
        match &self.begin_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn end_session(&self) {
        lock(&self.log).sessions_ended += 1;
    }
}
