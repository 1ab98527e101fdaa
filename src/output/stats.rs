//! Statistics generation from the record store
//!
//! This module provides functionality for extracting and displaying
//! what the store holds and how recent crawls went.

use crate::model::SourceId;
use crate::storage::{RecordStore, RunRecord, StorageResult};
use std::collections::BTreeMap;

/// Number of recent crawl runs shown by `--stats`
pub const RECENT_RUNS: usize = 10;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Total number of stored records
    pub total_records: u64,

    /// Stored records per source; sources without records are absent
    pub records_by_source: BTreeMap<SourceId, u64>,

    /// Most recent crawl runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The store to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(store: &dyn RecordStore) -> StorageResult<StoreStatistics> {
    Ok(StoreStatistics {
        total_records: store.count_records()?,
        records_by_source: store.count_records_by_source()?,
        recent_runs: store.latest_runs(RECENT_RUNS)?,
    })
}

/// Renders statistics as the text `print_statistics` writes
pub fn format_statistics(stats: &StoreStatistics) -> String {
    let mut out = String::from("=== Store Statistics ===\n\n");

    out.push_str(&format!("Total records: {}\n\n", stats.total_records));

    out.push_str("Records by Source:\n");
    for source in SourceId::ALL {
        let count = stats.records_by_source.get(&source).copied().unwrap_or(0);
        let percentage = if stats.total_records > 0 {
            (count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        out.push_str(&format!(
            "  {}: {} ({:.1}%)\n",
            source.display_name(),
            count,
            percentage
        ));
    }
    out.push('\n');

    if !stats.recent_runs.is_empty() {
        out.push_str(&format!("Recent Runs ({}):\n", stats.recent_runs.len()));
        for run in &stats.recent_runs {
            out.push_str(&format!(
                "  #{} {} \"{}\" {} - {} new, {} already stored, {} dropped\n",
                run.id,
                run.source.display_name(),
                run.query,
                run.status.to_db_string(),
                run.stats.inserted,
                run.stats.duplicates,
                run.stats.items_dropped()
            ));
            if let Some(error) = &run.error_message {
                out.push_str(&format!("      error: {}\n", error));
            }
        }
    }

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    print!("{}", format_statistics(stats));
}
