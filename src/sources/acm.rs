//! ACM Digital Library adapter

use crate::model::{PageCursor, RawRecord, SearchResultPage, SourceId};
use crate::sources::html::{all_text, first_text, joined_text, meta, ResultListing};
use crate::sources::{ensure_complete, AdapterError, HttpFetcher, SourceAdapter};
use async_trait::async_trait;
use scraper::Html;

pub(crate) const DEFAULT_BASE_URL: &str = "https://dl.acm.org";

const LISTING: ResultListing = ResultListing {
    container: ".search-result__xsl-body",
    no_results: ".search-result__no-result",
    links: ".search__item .issue-item__title a",
    next: ".pagination__btn--next",
};

/// ACM Digital Library search over its HTML result pages
#[derive(Debug, Clone)]
pub struct AcmSource {
    http: HttpFetcher,
}

impl AcmSource {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }

    fn parse_detail(&self, body: &str, url: &str) -> RawRecord {
        let document = Html::parse_document(body);

        // DOI links look like https://dl.acm.org/doi/10.1145/3357223.3362735
        let natural_key = url
            .split_once("/doi/")
            .map(|(_, doi)| doi.trim_start_matches("abs/").trim_start_matches("full/"))
            .map(str::to_string)
            .or_else(|| meta(&document, "dc.Identifier"));

        RawRecord {
            natural_key,
            title: first_text(&document, ".citation h1.citation__title")
                .or_else(|| first_text(&document, "h1.citation__title")),
            url: Some(url.to_string()),
            record_type: first_text(&document, ".citation .issue-heading"),
            venue: first_text(&document, ".citation .epub-section__title"),
            authors: all_text(&document, ".citation .loa__author-name"),
            abstract_text: joined_text(&document, ".abstractInFull p"),
            publication_date: first_text(&document, ".citation .CitationCoverDate"),
            ..RawRecord::new(SourceId::Acm)
        }
    }
}

#[async_trait]
impl SourceAdapter for AcmSource {
    fn id(&self) -> SourceId {
        SourceId::Acm
    }

    async fn fetch_result_page(
        &self,
        query: &str,
        cursor: &PageCursor,
    ) -> Result<SearchResultPage, AdapterError> {
        let url = self.http.endpoint("/action/doSearch");
        let params = [
            ("AllField", query.to_string()),
            ("startPage", cursor.page_index.to_string()),
            ("pageSize", cursor.page_size.to_string()),
        ];

        let body = self.http.get_text(&url, &params).await?;
        LISTING.parse(&body, &self.http, &url)
    }

    async fn fetch_detail(&self, url: &str) -> Result<RawRecord, AdapterError> {
        let body = self.http.get_text(url, &()).await?;
        ensure_complete(self.parse_detail(&body, url), url)
    }
}
