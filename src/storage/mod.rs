//! Storage module for persisting harvested records
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent record insertion keyed on `(source, natural_key)`
//! - Crawl run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{InsertOutcome, RecordStore, StorageError, StorageResult};

use crate::model::SourceId;
use crate::state::{CrawlState, CrawlStats};

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents one source's crawl in the database
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub source: SourceId,
    pub query: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stats: CrawlStats,
    pub error_message: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Done,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Maps a crawl loop's final state onto a run status
    ///
    /// Non-terminal states mean the loop never finished, which is stored as
    /// `running`.
    pub fn from_crawl_state(state: CrawlState) -> Self {
        match state {
            CrawlState::Done => Self::Done,
            CrawlState::Failed => Self::Failed,
            CrawlState::Cancelled => Self::Cancelled,
            CrawlState::FetchPage | CrawlState::FetchDetail | CrawlState::Persist => Self::Running,
        }
    }
}
