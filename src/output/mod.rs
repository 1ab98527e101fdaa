//! Output module for crawl reports and store statistics
//!
//! This module handles:
//! - Printing a crawl report to the terminal
//! - Writing the markdown summary of a crawl
//! - Summarizing what the record store holds

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_report, write_markdown_report};
pub use stats::{format_statistics, load_statistics, print_statistics, StoreStatistics};

use crate::crawler::CrawlReport;

/// Renders the terminal summary of a crawl report
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = format!("=== Results for \"{}\" ===\n\n", report.query);

    for source in report.sources.values() {
        out.push_str(&format!(
            "  {:<15} {:<10} {:>5} articles ({} new, {} already stored, {} dropped)\n",
            source.source.display_name(),
            source.state,
            source.count,
            source.stats.inserted,
            source.stats.duplicates,
            source.stats.items_dropped()
        ));
        if let Some(error) = &source.error {
            out.push_str(&format!("      error: {}\n", error));
        }
    }

    out.push_str(&format!("\nTotal: {} articles\n", report.total_records()));
    out
}

/// Prints the terminal summary of a crawl report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::SourceReport;
    use crate::model::SourceId;
    use std::collections::BTreeMap;

    #[test]
    fn test_format_report() {
        let report = CrawlReport {
            query: "kubernetes".to_string(),
            sources: BTreeMap::from([(
                SourceId::SpringerLink,
                SourceReport::failed(SourceId::SpringerLink, "no adapter registered"),
            )]),
        };

        let text = format_report(&report);
        assert!(text.starts_with("=== Results for \"kubernetes\" ==="));
        assert!(text.contains("Springer Link"));
        assert!(text.contains("failed"));
        assert!(text.contains("error: no adapter registered"));
        assert!(text.ends_with("Total: 0 articles\n"));
    }
}
