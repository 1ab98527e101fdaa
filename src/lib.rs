//! Biblio-Ripple: a polite academic-paper harvester
//!
//! This crate crawls academic repositories (ACM, arXiv, IEEE Xplore,
//! ScienceDirect, SpringerLink) for a search query, extracts bibliographic
//! records and stores them in SQLite, deduplicated on `(source, natural key)`.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod sources;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Biblio-Ripple operations
#[derive(Debug, Error)]
pub enum BiblioError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Biblio-Ripple operations
pub type Result<T> = std::result::Result<T, BiblioError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlReport, Orchestrator, SourceReport};
pub use model::{PageCursor, RawRecord, Record, SearchResultPage, SourceId};
pub use state::CrawlState;
