//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Biblio-Ripple database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested bibliographic records, one row per (source, natural key)
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    natural_key TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    record_type TEXT,
    venue TEXT,
    abstract TEXT,
    publication_date TEXT,
    citation_count INTEGER,
    added_at TEXT NOT NULL,
    UNIQUE(source, natural_key)
);

CREATE INDEX IF NOT EXISTS idx_records_source ON records(source);

-- Ordered author lists
CREATE TABLE IF NOT EXISTS record_authors (
    record_id INTEGER NOT NULL REFERENCES records(id),
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY(record_id, position)
);

-- One row per source per crawl
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    query TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    details_fetched INTEGER NOT NULL DEFAULT 0,
    inserted INTEGER NOT NULL DEFAULT 0,
    duplicates INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    exhausted INTEGER NOT NULL DEFAULT 0,
    validation_failures INTEGER NOT NULL DEFAULT 0,
    persistence_failures INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_runs_source ON crawl_runs(source);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
