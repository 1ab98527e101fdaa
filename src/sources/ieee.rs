//! IEEE Xplore adapter
//!
//! Search goes through the JSON endpoint the Xplore web app uses. Detail
//! pages embed the full document metadata as a JavaScript object literal,
//! which is valid JSON and is decoded directly.

use crate::model::{PageCursor, RawRecord, SearchResultPage, SourceId};
use crate::sources::{ensure_complete, AdapterError, HttpFetcher, SourceAdapter};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const DEFAULT_BASE_URL: &str = "https://ieeexplore.ieee.org";

static METADATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"xplGlobal\.document\.metadata\s*=\s*").expect("valid regex")
});

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query_text: &'a str,
    highlight: bool,
    return_facets: [&'static str; 1],
    match_pubs: bool,
    page_number: u32,
    rows_per_page: u32,
    new_search: bool,
    return_type: &'static str,
    refinements: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    records: Vec<SearchHit>,
    #[serde(default)]
    total_records: u64,
    #[serde(default)]
    end_record: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    document_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMetadata {
    doi: Option<String>,
    article_number: Option<Value>,
    title: Option<String>,
    display_doc_title: Option<String>,
    publication_title: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    publication_date: Option<String>,
    citation_count: Option<Value>,
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

/// IEEE Xplore search over its JSON REST endpoint
#[derive(Debug, Clone)]
pub struct IeeeSource {
    http: HttpFetcher,
}

impl IeeeSource {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }

    /// Xplore rejects REST calls that do not look like they came from its search page
    fn search_headers(&self, query: &str) -> HeaderMap {
        let referer = format!(
            "{}/search/searchresult.jsp?queryText={}",
            self.http.base_url().as_str().trim_end_matches('/'),
            urlencoding::encode(query)
        );

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, value);
        }
        headers
    }

    fn parse_detail(&self, body: &str, url: &str) -> Result<RawRecord, AdapterError> {
        let missing = || AdapterError::Malformed {
            url: url.to_string(),
            reason: "no document metadata block".to_string(),
        };
        let start = METADATA_RE.find(body).ok_or_else(missing)?.end();

        // Decode exactly one JSON value after the assignment; the script
        // that follows it is never looked at
        let metadata: DocumentMetadata = serde_json::Deserializer::from_str(&body[start..])
            .into_iter::<DocumentMetadata>()
            .next()
            .ok_or_else(missing)?
            .map_err(|e| AdapterError::Malformed {
                url: url.to_string(),
                reason: format!("document metadata: {}", e),
            })?;

        Ok(RawRecord {
            natural_key: metadata
                .doi
                .or_else(|| {
                    metadata
                        .article_number
                        .as_ref()
                        .and_then(scalar_text)
                        .map(|n| format!("ieee:{}", n))
                }),
            title: metadata.title.or(metadata.display_doc_title),
            url: Some(url.to_string()),
            record_type: metadata.content_type,
            venue: metadata.publication_title,
            authors: metadata
                .authors
                .into_iter()
                .filter_map(|author| author.name)
                .collect(),
            abstract_text: metadata.abstract_text,
            publication_date: metadata.publication_date,
            citation_count: metadata.citation_count.as_ref().and_then(citation_count),
            ..RawRecord::new(SourceId::Ieee)
        })
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Citation counts arrive as either a number or a numeric string
fn citation_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for IeeeSource {
    fn id(&self) -> SourceId {
        SourceId::Ieee
    }

    async fn fetch_result_page(
        &self,
        query: &str,
        cursor: &PageCursor,
    ) -> Result<SearchResultPage, AdapterError> {
        let url = self.http.endpoint("/rest/search");
        let request = SearchRequest {
            query_text: query,
            highlight: true,
            return_facets: ["ALL"],
            match_pubs: true,
            page_number: cursor.page_index + 1,
            rows_per_page: cursor.page_size,
            new_search: cursor.page_index == 0,
            return_type: "SEARCH",
            refinements: Vec::new(),
        };

        let response: SearchResponse = self
            .http
            .post_json(&url, &request, self.search_headers(query))
            .await?;

        Ok(SearchResultPage {
            detail_links: response
                .records
                .iter()
                .filter_map(|hit| hit.document_link.as_deref())
                .filter_map(|link| self.http.resolve(link))
                .collect(),
            has_next: response.end_record < response.total_records,
        })
    }

    async fn fetch_detail(&self, url: &str) -> Result<RawRecord, AdapterError> {
        let body = self.http.get_text(url, &()).await?;
        ensure_complete(self.parse_detail(&body, url)?, url)
    }
}
