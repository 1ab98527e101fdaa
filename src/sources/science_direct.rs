//! ScienceDirect adapter

use crate::model::{PageCursor, RawRecord, SearchResultPage, SourceId};
use crate::sources::html::{child_text, first_text, joined_text, meta, select_all, ResultListing};
use crate::sources::{ensure_complete, AdapterError, HttpFetcher, SourceAdapter};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

pub(crate) const DEFAULT_BASE_URL: &str = "https://www.sciencedirect.com";

const LISTING: ResultListing = ResultListing {
    container: ".search-result-wrapper",
    no_results: ".error-zero-results",
    links: ".result-item-content .result-list-title-link",
    next: ".pagination-link.next-link",
};

static BANNER_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}\s+[A-Za-z]+\s+\d{4})").expect("valid regex"));

/// ScienceDirect search over its HTML result pages
#[derive(Debug, Clone)]
pub struct ScienceDirectSource {
    http: HttpFetcher,
}

impl ScienceDirectSource {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }

    fn parse_detail(&self, body: &str, url: &str) -> RawRecord {
        let document = Html::parse_document(body);

        let authors = select_all(&document, ".author-group .author")
            .into_iter()
            .filter_map(|author| {
                let parts: Vec<String> = [".given-name", ".surname"]
                    .iter()
                    .filter_map(|css| child_text(author, css))
                    .collect();
                (!parts.is_empty()).then(|| parts.join(" "))
            })
            .collect();

        let banner_date = first_text(&document, "#banner .wrapper p").and_then(|line| {
            BANNER_DATE_RE
                .captures(&line)
                .map(|caps| caps[1].to_string())
        });

        RawRecord {
            natural_key: first_text(&document, ".ArticleIdentifierLinks .doi")
                .or_else(|| meta(&document, "citation_doi")),
            title: first_text(&document, ".title-text"),
            url: Some(url.to_string()),
            record_type: first_text(&document, ".article-dochead > span"),
            venue: first_text(&document, ".publication-title-link")
                .or_else(|| meta(&document, "citation_journal_title")),
            authors,
            abstract_text: joined_text(&document, ".abstract.author p"),
            publication_date: banner_date
                .or_else(|| meta(&document, "citation_publication_date")),
            ..RawRecord::new(SourceId::ScienceDirect)
        }
    }
}

#[async_trait]
impl SourceAdapter for ScienceDirectSource {
    fn id(&self) -> SourceId {
        SourceId::ScienceDirect
    }

    async fn fetch_result_page(
        &self,
        query: &str,
        cursor: &PageCursor,
    ) -> Result<SearchResultPage, AdapterError> {
        let url = self.http.endpoint("/search");
        let params = [
            ("qs", query.to_string()),
            ("offset", cursor.offset().to_string()),
            ("show", cursor.page_size.to_string()),
            ("sortBy", "date".to_string()),
        ];

        let body = self.http.get_text(&url, &params).await?;
        LISTING.parse(&body, &self.http, &url)
    }

    async fn fetch_detail(&self, url: &str) -> Result<RawRecord, AdapterError> {
        let body = self.http.get_text(url, &()).await?;
        ensure_complete(self.parse_detail(&body, url), url)
    }
}
