//! Small selector helpers over `scraper` documents
//!
//! Text is whitespace-collapsed and empty matches are treated as absent.

use crate::model::SearchResultPage;
use crate::sources::{AdapterError, HttpFetcher};
use scraper::{ElementRef, Html, Selector};

/// How a site lays out one page of search results
#[derive(Debug, Clone, Copy)]
pub struct ResultListing {
    /// Element wrapping the result entries
    pub container: &'static str,
    /// Element shown instead when the query matched nothing
    pub no_results: &'static str,
    /// Links to the detail pages, inside the container
    pub links: &'static str,
    /// Present only when another page follows
    pub next: &'static str,
}

impl ResultListing {
    /// Extracts the detail links and the next-page flag from a result page
    ///
    /// A page with neither the result container nor the no-results marker
    /// is not a result page (a block, captcha or consent page, or a changed
    /// layout) and is reported as `Malformed`.
    pub fn parse(
        &self,
        body: &str,
        http: &HttpFetcher,
        url: &str,
    ) -> Result<SearchResultPage, AdapterError> {
        let document = Html::parse_document(body);

        if !exists(&document, self.container) {
            if exists(&document, self.no_results) {
                return Ok(SearchResultPage::default());
            }
            return Err(AdapterError::Malformed {
                url: url.to_string(),
                reason: format!("no result list ({}) on the page", self.container),
            });
        }

        Ok(SearchResultPage {
            detail_links: all_attr(&document, self.links, "href")
                .iter()
                .filter_map(|href| http.resolve(href))
                .collect(),
            has_next: exists(&document, self.next),
        })
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first element matching `css`
pub fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Text of every element matching `css`, in document order
pub fn all_text(document: &Html, css: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Text of every element matching `css`, joined by a space
pub fn joined_text(document: &Html, css: &str) -> Option<String> {
    let parts = all_text(document, css);
    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Attribute value of the first element matching `css` that carries it
pub fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Attribute values of every element matching `css`
pub fn all_attr(document: &Html, css: &str, attr: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Content of a `<meta name="...">` tag
pub fn meta(document: &Html, name: &str) -> Option<String> {
    first_attr(document, &format!("meta[name='{}']", name), "content")
}

/// Whether any element matches `css`
pub fn exists(document: &Html, css: &str) -> bool {
    Selector::parse(css)
        .map(|selector| document.select(&selector).next().is_some())
        .unwrap_or(false)
}

/// Element references matching `css`, for callers that need nested selects
pub fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    document.select(&selector).collect()
}

/// Text of the first descendant of `element` matching `css`
pub fn child_text(element: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    element
        .select(&selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}
