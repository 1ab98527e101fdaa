//! SpringerLink adapter, limited to conference papers

use crate::model::{PageCursor, RawRecord, SearchResultPage, SourceId};
use crate::sources::html::{all_attr, all_text, first_attr, first_text, joined_text, meta, ResultListing};
use crate::sources::{ensure_complete, AdapterError, HttpFetcher, SourceAdapter};
use async_trait::async_trait;
use scraper::Html;

pub(crate) const DEFAULT_BASE_URL: &str = "https://link.springer.com";

const LISTING: ResultListing = ResultListing {
    container: ".content-item-list",
    no_results: "#no-results-message",
    links: ".content-item-list > li a.title",
    next: ".pagination a.next",
};

const CONTENT_TYPE_FACET: &str = "\"ConferencePaper\"";

/// SpringerLink search over its HTML result pages
#[derive(Debug, Clone)]
pub struct SpringerSource {
    http: HttpFetcher,
}

impl SpringerSource {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }

    fn parse_detail(&self, body: &str, url: &str) -> RawRecord {
        let document = Html::parse_document(body);

        let mut authors = all_text(&document, ".authors__name");
        if authors.is_empty() {
            authors = all_attr(&document, "meta[name='citation_author']", "content");
        }

        RawRecord {
            natural_key: meta(&document, "citation_doi"),
            title: first_text(&document, ".MainTitleSection > h1")
                .or_else(|| meta(&document, "citation_title")),
            url: Some(url.to_string()),
            record_type: Some("Conference paper".to_string()),
            venue: first_text(&document, ".ConfSeriesName")
                .or_else(|| meta(&document, "citation_conference_title")),
            authors,
            abstract_text: joined_text(&document, ".Abstract > p"),
            publication_date: first_attr(&document, ".article-dates__first-online > time", "datetime")
                .or_else(|| meta(&document, "citation_publication_date")),
            ..RawRecord::new(SourceId::SpringerLink)
        }
    }
}

#[async_trait]
impl SourceAdapter for SpringerSource {
    fn id(&self) -> SourceId {
        SourceId::SpringerLink
    }

    /// SpringerLink pages are one-based and sized by the site
    async fn fetch_result_page(
        &self,
        query: &str,
        cursor: &PageCursor,
    ) -> Result<SearchResultPage, AdapterError> {
        let url = self
            .http
            .endpoint(&format!("/search/page/{}", cursor.page_index + 1));
        let params = [("query", query), ("facet-content-type", CONTENT_TYPE_FACET)];

        let body = self.http.get_text(&url, &params).await?;
        LISTING.parse(&body, &self.http, &url)
    }

    async fn fetch_detail(&self, url: &str) -> Result<RawRecord, AdapterError> {
        let body = self.http.get_text(url, &()).await?;
        ensure_complete(self.parse_detail(&body, url), url)
    }
}
