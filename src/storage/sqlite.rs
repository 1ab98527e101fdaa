//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::model::{NewRecord, Record, SourceId};
use crate::state::CrawlStats;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{InsertOutcome, RecordStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Storage format of `records.publication_date`
const DATE_FORMAT: &str = "%Y-%m-%d";

const RECORD_COLUMNS: &str = "id, source, natural_key, title, url, record_type, venue, abstract,
     publication_date, citation_count, added_at";

const RUN_COLUMNS: &str = "id, source, query, config_hash, status, started_at, finished_at,
     pages_fetched, details_fetched, inserted, duplicates, skipped, exhausted,
     validation_failures, persistence_failures, error_message";

/// SQLite storage backend
///
/// A single connection guarded by a mutex; every operation runs under the
/// lock, so the store can be shared between concurrent crawl loops.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database, used by tests and dry runs
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Lock)
    }
}

/// Columns of a `records` row before authors are attached
struct RecordRow {
    id: i64,
    source: String,
    natural_key: String,
    title: String,
    url: String,
    record_type: Option<String>,
    venue: Option<String>,
    abstract_text: Option<String>,
    publication_date: Option<String>,
    citation_count: Option<i64>,
    added_at: String,
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        source: row.get(1)?,
        natural_key: row.get(2)?,
        title: row.get(3)?,
        url: row.get(4)?,
        record_type: row.get(5)?,
        venue: row.get(6)?,
        abstract_text: row.get(7)?,
        publication_date: row.get(8)?,
        citation_count: row.get(9)?,
        added_at: row.get(10)?,
    })
}

fn parse_source(table: &'static str, value: &str) -> StorageResult<SourceId> {
    SourceId::from_db_string(value).ok_or_else(|| StorageError::Corrupt {
        table,
        detail: format!("unknown source '{}'", value),
    })
}

fn load_authors(conn: &Connection, record_id: i64) -> StorageResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM record_authors WHERE record_id = ?1 ORDER BY position")?;
    let authors = stmt
        .query_map(params![record_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(authors)
}

fn hydrate_record(conn: &Connection, row: RecordRow) -> StorageResult<Record> {
    let added_at = DateTime::parse_from_rfc3339(&row.added_at)
        .map_err(|e| StorageError::Corrupt {
            table: "records",
            detail: format!("bad added_at '{}': {}", row.added_at, e),
        })?
        .with_timezone(&Utc);

    Ok(Record {
        source: parse_source("records", &row.source)?,
        natural_key: row.natural_key,
        title: row.title,
        url: row.url,
        record_type: row.record_type,
        venue: row.venue,
        authors: load_authors(conn, row.id)?,
        abstract_text: row.abstract_text,
        publication_date: row
            .publication_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok()),
        citation_count: row.citation_count.and_then(|c| u64::try_from(c).ok()),
        added_at,
    })
}

fn find_record(
    conn: &Connection,
    source: SourceId,
    natural_key: &str,
) -> StorageResult<Option<Record>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM records WHERE source = ?1 AND natural_key = ?2",
                RECORD_COLUMNS
            ),
            params![source.as_str(), natural_key],
            map_record_row,
        )
        .optional()?;

    row.map(|row| hydrate_record(conn, row)).transpose()
}

fn count_to_sql(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn count_from_sql(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Columns of a `crawl_runs` row before parsing
struct RunRow {
    id: i64,
    source: String,
    query: String,
    config_hash: String,
    status: String,
    started_at: String,
    finished_at: Option<String>,
    counters: [i64; 8],
    error_message: Option<String>,
}

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        id: row.get(0)?,
        source: row.get(1)?,
        query: row.get(2)?,
        config_hash: row.get(3)?,
        status: row.get(4)?,
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
        counters: [
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
            row.get(11)?,
            row.get(12)?,
            row.get(13)?,
            row.get(14)?,
        ],
        error_message: row.get(15)?,
    })
}

impl TryFrom<RunRow> for RunRecord {
    type Error = StorageError;

    fn try_from(row: RunRow) -> StorageResult<Self> {
        let status = RunStatus::from_db_string(&row.status).ok_or_else(|| StorageError::Corrupt {
            table: "crawl_runs",
            detail: format!("unknown status '{}'", row.status),
        })?;
        let [pages_fetched, details_fetched, inserted, duplicates, skipped, exhausted, validation_failures, persistence_failures] =
            row.counters.map(count_from_sql);

        Ok(RunRecord {
            id: row.id,
            source: parse_source("crawl_runs", &row.source)?,
            query: row.query,
            config_hash: row.config_hash,
            status,
            started_at: row.started_at,
            finished_at: row.finished_at,
            stats: CrawlStats {
                pages_fetched,
                details_fetched,
                inserted,
                duplicates,
                skipped,
                exhausted,
                validation_failures,
                persistence_failures,
            },
            error_message: row.error_message,
        })
    }
}

impl RecordStore for SqliteStorage {
    // ===== Records =====

    fn insert_if_absent(&self, record: &NewRecord) -> StorageResult<InsertOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let added_at = Utc::now();
        let changed = tx.execute(
            "INSERT INTO records (source, natural_key, title, url, record_type, venue, abstract,
                                  publication_date, citation_count, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(source, natural_key) DO NOTHING",
            params![
                record.source.as_str(),
                record.natural_key,
                record.title,
                record.url,
                record.record_type,
                record.venue,
                record.abstract_text,
                record
                    .publication_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                record.citation_count.map(count_to_sql),
                added_at.to_rfc3339(),
            ],
        )?;

        let outcome = if changed == 1 {
            let record_id = tx.last_insert_rowid();
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO record_authors (record_id, position, name) VALUES (?1, ?2, ?3)",
                )?;
                for (position, name) in record.authors.iter().enumerate() {
                    stmt.execute(params![record_id, position as i64, name])?;
                }
            }
            InsertOutcome::Inserted(record.clone().into_record(added_at))
        } else {
            let existing = find_record(&tx, record.source, &record.natural_key)?.ok_or_else(
                || {
                    StorageError::Database(format!(
                        "conflicting row for {}:{} not found",
                        record.source.as_str(),
                        record.natural_key
                    ))
                },
            )?;
            InsertOutcome::AlreadyPresent(existing)
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn get_record(&self, source: SourceId, natural_key: &str) -> StorageResult<Option<Record>> {
        let conn = self.lock()?;
        find_record(&conn, source, natural_key)
    }

    fn records_by_source(&self, source: SourceId) -> StorageResult<Vec<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM records WHERE source = ?1 ORDER BY id",
            RECORD_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![source.as_str()], map_record_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| hydrate_record(&conn, row))
            .collect()
    }

    fn count_records(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count_from_sql(count))
    }

    fn count_records_by_source(&self) -> StorageResult<BTreeMap<SourceId, u64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT source, COUNT(*) FROM records GROUP BY source")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(source, count)| Ok((parse_source("records", &source)?, count_from_sql(count))))
            .collect()
    }

    // ===== Run Management =====

    fn create_run(&self, source: SourceId, query: &str, config_hash: &str) -> StorageResult<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO crawl_runs (source, query, config_hash, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                source.as_str(),
                query,
                config_hash,
                RunStatus::Running.to_db_string(),
                now
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        stats: &CrawlStats,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE crawl_runs SET status = ?1, finished_at = ?2,
                pages_fetched = ?3, details_fetched = ?4, inserted = ?5, duplicates = ?6,
                skipped = ?7, exhausted = ?8, validation_failures = ?9,
                persistence_failures = ?10, error_message = ?11
             WHERE id = ?12",
            params![
                status.to_db_string(),
                now,
                count_to_sql(stats.pages_fetched),
                count_to_sql(stats.details_fetched),
                count_to_sql(stats.inserted),
                count_to_sql(stats.duplicates),
                count_to_sql(stats.skipped),
                count_to_sql(stats.exhausted),
                count_to_sql(stats.validation_failures),
                count_to_sql(stats.persistence_failures),
                error,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM crawl_runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                map_run_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))?;

        RunRecord::try_from(row)
    }

    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM crawl_runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], map_run_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RunRecord::try_from).collect()
    }
}
