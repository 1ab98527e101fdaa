//! Markdown summary generation
//!
//! This module renders a crawl report as a human-readable markdown file:
//! a per-source table, any failures, and the records each source found.

use crate::crawler::{CrawlReport, SourceReport};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Records listed per source before the list is truncated
const MAX_LISTED_RECORDS: usize = 50;

/// Writes the markdown summary of a crawl report to `output_path`
///
/// # Arguments
///
/// * `report` - The finished crawl report
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(BiblioError)` - Failed to write summary
pub fn write_markdown_report(report: &CrawlReport, output_path: &Path) -> crate::Result<()> {
    let markdown = format_markdown_report(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_report(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str("# Biblio-Ripple Crawl Summary\n\n");

    md.push_str("## Query\n\n");
    md.push_str(&format!("- **Query**: {}\n", report.query));
    md.push_str(&format!("- **Sources**: {}\n", report.sources.len()));
    md.push_str(&format!("- **Records found**: {}\n\n", report.total_records()));

    md.push_str("## Sources\n\n");
    md.push_str("| Source | State | Records | New | Already stored | Dropped | Pages |\n");
    md.push_str("|--------|-------|---------|-----|----------------|---------|-------|\n");
    for source in report.sources.values() {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            source.source.display_name(),
            source.state,
            source.count,
            source.stats.inserted,
            source.stats.duplicates,
            source.stats.items_dropped(),
            source.stats.pages_fetched
        ));
    }
    md.push('\n');

    let failures: Vec<&SourceReport> = report
        .sources
        .values()
        .filter(|source| source.error.is_some())
        .collect();
    if !failures.is_empty() {
        md.push_str("## Errors\n\n");
        for source in failures {
            md.push_str(&format!(
                "- **{}**: {}\n",
                source.source.display_name(),
                source.error.as_deref().unwrap_or_default()
            ));
        }
        md.push('\n');
    }

    for source in report.sources.values().filter(|s| !s.records.is_empty()) {
        md.push_str(&format!("## {}\n\n", source.source.display_name()));

        for record in source.records.iter().take(MAX_LISTED_RECORDS) {
            let year = record
                .publication_date
                .map(|date| format!(" ({})", date.format("%Y")))
                .unwrap_or_default();
            md.push_str(&format!("- [{}]({}){}", record.title, record.url, year));
            if !record.authors.is_empty() {
                md.push_str(&format!(" - {}", record.authors.join(", ")));
            }
            md.push('\n');
        }

        if source.records.len() > MAX_LISTED_RECORDS {
            md.push_str(&format!(
                "\n... and {} more\n",
                source.records.len() - MAX_LISTED_RECORDS
            ));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, SourceId};
    use crate::state::{CrawlState, CrawlStats};
    use chrono::{NaiveDate, Utc};
    use std::collections::BTreeMap;

    fn record(key: &str, title: &str) -> Record {
        Record {
            source: SourceId::Acm,
            natural_key: key.to_string(),
            title: title.to_string(),
            url: format!("https://dl.acm.org/doi/{}", key),
            record_type: None,
            venue: None,
            authors: vec!["Ada Lovelace".to_string()],
            abstract_text: None,
            publication_date: NaiveDate::from_ymd_opt(2019, 11, 20),
            citation_count: None,
            added_at: Utc::now(),
        }
    }

    fn report() -> CrawlReport {
        let acm = SourceReport {
            source: SourceId::Acm,
            state: CrawlState::Done,
            count: 1,
            records: vec![record("10.1145/1", "Kubernetes at scale")],
            stats: CrawlStats {
                pages_fetched: 1,
                details_fetched: 1,
                inserted: 1,
                ..CrawlStats::default()
            },
            error: None,
        };
        let ieee = SourceReport::failed(SourceId::Ieee, "result page 0: HTTP 503");

        CrawlReport {
            query: "kubernetes".to_string(),
            sources: BTreeMap::from([(SourceId::Acm, acm), (SourceId::Ieee, ieee)]),
        }
    }

    #[test]
    fn test_format_markdown_report() {
        let md = format_markdown_report(&report());

        assert!(md.contains("# Biblio-Ripple Crawl Summary"));
        assert!(md.contains("- **Query**: kubernetes"));
        assert!(md.contains("- **Records found**: 1"));
        assert!(md.contains("| ACM | done | 1 | 1 | 0 | 0 | 1 |"));
        assert!(md.contains("## Errors"));
        assert!(md.contains("result page 0: HTTP 503"));
        assert!(md.contains(
            "- [Kubernetes at scale](https://dl.acm.org/doi/10.1145/1) (2019) - Ada Lovelace"
        ));
    }

    #[test]
    fn test_long_record_lists_are_truncated() {
        let mut report = report();
        let acm = report.sources.get_mut(&SourceId::Acm).unwrap();
        acm.records = (0..60)
            .map(|i| record(&format!("10.1145/{}", i), "T"))
            .collect();
        acm.count = 60;

        let md = format_markdown_report(&report);
        assert!(md.contains("... and 10 more"));
    }

    #[test]
    fn test_write_markdown_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");

        write_markdown_report(&report(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Biblio-Ripple Crawl Summary"));
    }
}
