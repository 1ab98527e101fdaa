//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{NewRecord, Record, SourceId};
use crate::state::CrawlStats;
use crate::storage::{RunRecord, RunStatus};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },

    #[error("Storage lock poisoned")]
    Lock,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What `insert_if_absent` did with a record
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The record was new and has been written
    Inserted(Record),
    /// A record with the same `(source, natural_key)` already existed; this
    /// is the stored row, left untouched
    AlreadyPresent(Record),
}

impl InsertOutcome {
    pub fn record(&self) -> &Record {
        match self {
            Self::Inserted(record) | Self::AlreadyPresent(record) => record,
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            Self::Inserted(record) | Self::AlreadyPresent(record) => record,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Trait for storage backend implementations
///
/// Methods take `&self` so one store can be shared by every concurrent crawl
/// loop; implementations serialize access internally. Records are only ever
/// inserted, never updated or deleted.
pub trait RecordStore: Send + Sync {
    // ===== Records =====

    /// Inserts a record unless one with the same `(source, natural_key)` exists
    ///
    /// Conflict detection is atomic, so two concurrent calls for the same key
    /// produce exactly one `Inserted`.
    fn insert_if_absent(&self, record: &NewRecord) -> StorageResult<InsertOutcome>;

    /// Gets a record by its natural key
    fn get_record(&self, source: SourceId, natural_key: &str) -> StorageResult<Option<Record>>;

    /// Gets every record of a source, oldest first
    fn records_by_source(&self, source: SourceId) -> StorageResult<Vec<Record>>;

    /// Counts all stored records
    fn count_records(&self) -> StorageResult<u64>;

    /// Counts stored records per source; sources without records are absent
    fn count_records_by_source(&self) -> StorageResult<BTreeMap<SourceId, u64>>;

    // ===== Run Management =====

    /// Creates a crawl run in the `running` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&self, source: SourceId, query: &str, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run as finished with its final status and counters
    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        stats: &CrawlStats,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
