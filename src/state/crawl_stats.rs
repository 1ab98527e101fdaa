use serde::Serialize;

/// Counters kept by one crawl loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Result pages fetched successfully
    pub pages_fetched: u64,
    /// Detail pages fetched successfully
    pub details_fetched: u64,
    /// Records newly written to the store
    pub inserted: u64,
    /// Records the store already held
    pub duplicates: u64,
    /// Detail links dropped for missing fields or other permanent failures
    pub skipped: u64,
    /// Detail links dropped after running out of retry attempts
    pub exhausted: u64,
    pub validation_failures: u64,
    pub persistence_failures: u64,
}

impl CrawlStats {
    /// Records that ended up in the crawl result, new or already stored
    pub fn records_found(&self) -> u64 {
        self.inserted + self.duplicates
    }

    /// Detail links that produced no record
    pub fn items_dropped(&self) -> u64 {
        self.skipped + self.exhausted + self.validation_failures + self.persistence_failures
    }
}
