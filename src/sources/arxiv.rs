//! arXiv adapter

use crate::model::{PageCursor, RawRecord, SearchResultPage, SourceId};
use crate::sources::html::{all_text, first_attr, first_text, ResultListing};
use crate::sources::{ensure_complete, AdapterError, HttpFetcher, SourceAdapter};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

pub(crate) const DEFAULT_BASE_URL: &str = "https://arxiv.org";

const LISTING: ResultListing = ResultListing {
    container: "ol.breathe-horizontal",
    no_results: "p.is-size-4.has-text-warning",
    links: ".arxiv-result .list-title > a",
    next: ".pagination .pagination-next:not(.is-invisible)",
};

static SUBMITTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Submitted on (\d{1,2} [A-Za-z]+\.? \d{4})").expect("valid regex")
});
static ABS_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/abs/([A-Za-z\-\.]+/\d{7}|\d{4}\.\d{4,5})(v\d+)?").expect("valid regex")
});

/// arXiv search over its HTML result pages
#[derive(Debug, Clone)]
pub struct ArxivSource {
    http: HttpFetcher,
}

impl ArxivSource {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }

    fn parse_detail(&self, body: &str, url: &str) -> RawRecord {
        let document = Html::parse_document(body);

        // Prefer the journal DOI; unpublished preprints fall back to the arXiv id
        let natural_key = first_attr(&document, "a[data-doi]", "data-doi")
            .or_else(|| arxiv_id(url).map(|id| format!("arXiv:{}", id)));

        RawRecord {
            natural_key,
            title: first_text(&document, "h1.title").map(|t| strip_label(&t, "Title:")),
            url: Some(url.to_string()),
            record_type: Some("article".to_string()),
            venue: first_text(&document, ".tablecell.jref"),
            authors: all_text(&document, ".authors a"),
            abstract_text: first_text(&document, "blockquote.abstract")
                .map(|a| strip_label(&a, "Abstract:")),
            publication_date: first_text(&document, ".dateline").and_then(|line| {
                SUBMITTED_RE
                    .captures(&line)
                    .map(|caps| caps[1].to_string())
            }),
            ..RawRecord::new(SourceId::Arxiv)
        }
    }
}

/// Extracts the version-less arXiv identifier from an abstract URL
fn arxiv_id(url: &str) -> Option<String> {
    ABS_ID_RE.captures(url).map(|caps| caps[1].to_string())
}

fn strip_label(text: &str, label: &str) -> String {
    text.trim()
        .strip_prefix(label)
        .unwrap_or(text)
        .trim()
        .to_string()
}

#[async_trait]
impl SourceAdapter for ArxivSource {
    fn id(&self) -> SourceId {
        SourceId::Arxiv
    }

    async fn fetch_result_page(
        &self,
        query: &str,
        cursor: &PageCursor,
    ) -> Result<SearchResultPage, AdapterError> {
        let url = self.http.endpoint("/search/");
        let params = [
            ("query", query.to_string()),
            ("searchtype", "all".to_string()),
            ("abstracts", "hide".to_string()),
            ("order", "-announced_date_first".to_string()),
            ("size", cursor.page_size.to_string()),
            ("start", cursor.offset().to_string()),
        ];

        let body = self.http.get_text(&url, &params).await?;
        LISTING.parse(&body, &self.http, &url)
    }

    async fn fetch_detail(&self, url: &str) -> Result<RawRecord, AdapterError> {
        let body = self.http.get_text(url, &()).await?;
        ensure_complete(self.parse_detail(&body, url), url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_fetcher;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESULTS: &str = r#"
        <ol class="breathe-horizontal">
          <li class="arxiv-result">
            <p class="list-title is-inline-block"><a href="https://arxiv.org/abs/2101.00001">arXiv:2101.00001</a></p>
          </li>
          <li class="arxiv-result">
            <p class="list-title is-inline-block"><a href="https://arxiv.org/abs/2101.00002">arXiv:2101.00002</a></p>
          </li>
        </ol>
        <nav class="pagination">
          <a class="pagination-previous is-invisible">Previous</a>
          <a class="pagination-next is-invisible">Next</a>
        </nav>
    "#;

    const ABSTRACT_PAGE: &str = r#"
        <div id="abs">
          <div class="dateline">[Submitted on 3 Mar 2021 (v1), last revised 9 Apr 2021 (this version, v2)]</div>
          <h1 class="title mathjax"><span class="descriptor">Title:</span>Elastic   Kubernetes Scheduling</h1>
          <div class="authors"><span class="descriptor">Authors:</span><a href="/a/1">Grace Hopper</a>, <a href="/a/2">Barbara Liskov</a></div>
          <blockquote class="abstract mathjax"><span class="descriptor">Abstract:</span> We schedule pods.</blockquote>
        </div>
    "#;

    #[tokio::test]
    async fn test_fetch_result_page_uses_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .and(query_param("query", "kubernetes"))
            .and(query_param("size", "50"))
            .and(query_param("start", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS))
            .mount(&server)
            .await;

        let arxiv = ArxivSource::new(test_fetcher(&server.uri()));
        let mut cursor = PageCursor::new(SourceId::Arxiv, "kubernetes", 50);
        cursor.advance();
        cursor.advance();

        let page = arxiv.fetch_result_page("kubernetes", &cursor).await.unwrap();

        assert_eq!(
            page.detail_links,
            vec![
                "https://arxiv.org/abs/2101.00001",
                "https://arxiv.org/abs/2101.00002"
            ]
        );
        // The next button is present but invisible on the last page
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn test_rate_limit_page_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><h1>Rate exceeded.</h1><p>Sorry, your request has been denied.</p></body></html>",
            ))
            .mount(&server)
            .await;

        let arxiv = ArxivSource::new(test_fetcher(&server.uri()));
        let cursor = PageCursor::new(SourceId::Arxiv, "kubernetes", 50);
        let err = arxiv.fetch_result_page("kubernetes", &cursor).await.unwrap_err();

        assert!(matches!(err, AdapterError::Malformed { ref reason, .. } if reason.contains("ol.breathe-horizontal")));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_no_results_page_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<main><p class="is-size-4 has-text-warning">Sorry, your query returned no results</p></main>"#,
            ))
            .mount(&server)
            .await;

        let arxiv = ArxivSource::new(test_fetcher(&server.uri()));
        let cursor = PageCursor::new(SourceId::Arxiv, "zzzz", 50);
        let page = arxiv.fetch_result_page("zzzz", &cursor).await.unwrap();

        assert!(page.detail_links.is_empty());
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn test_fetch_detail_without_doi_uses_arxiv_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/abs/2101.00001v2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ABSTRACT_PAGE))
            .mount(&server)
            .await;

        let arxiv = ArxivSource::new(test_fetcher(&server.uri()));
        let url = format!("{}/abs/2101.00001v2", server.uri());
        let record = arxiv.fetch_detail(&url).await.unwrap();

        assert_eq!(record.natural_key.as_deref(), Some("arXiv:2101.00001"));
        assert_eq!(record.title.as_deref(), Some("Elastic Kubernetes Scheduling"));
        assert_eq!(record.authors, vec!["Grace Hopper", "Barbara Liskov"]);
        assert_eq!(record.abstract_text.as_deref(), Some("We schedule pods."));
        assert_eq!(record.publication_date.as_deref(), Some("3 Mar 2021"));
        assert_eq!(record.record_type.as_deref(), Some("article"));
    }

    #[test]
    fn test_doi_wins_over_arxiv_id() {
        let arxiv = ArxivSource::new(test_fetcher("https://arxiv.org"));
        let page = format!(
            r#"{}<span class="tablecell doi"><a data-doi="10.1109/TPDS.2021.1" href="https://doi.org/10.1109/TPDS.2021.1">10.1109/TPDS.2021.1</a></span>"#,
            ABSTRACT_PAGE
        );

        let record = arxiv.parse_detail(&page, "https://arxiv.org/abs/2101.00001");
        assert_eq!(record.natural_key.as_deref(), Some("10.1109/TPDS.2021.1"));
    }

    #[test]
    fn test_arxiv_id_formats() {
        assert_eq!(
            arxiv_id("https://arxiv.org/abs/2101.00001v3").as_deref(),
            Some("2101.00001")
        );
        assert_eq!(
            arxiv_id("https://arxiv.org/abs/cs/0112017").as_deref(),
            Some("cs/0112017")
        );
        assert_eq!(arxiv_id("https://arxiv.org/list/cs"), None);
    }
}
