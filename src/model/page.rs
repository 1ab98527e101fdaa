use crate::model::SourceId;

/// Pagination position of one crawl loop
///
/// Owned by a single crawl and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub source: SourceId,
    pub query: String,
    /// Zero-based index of the result page
    pub page_index: u32,
    pub page_size: u32,
}

impl PageCursor {
    /// Creates a cursor positioned on the first result page
    pub fn new(source: SourceId, query: &str, page_size: u32) -> Self {
        Self {
            source,
            query: query.to_string(),
            page_index: 0,
            page_size,
        }
    }

    /// Zero-based offset of the first result on the current page
    pub fn offset(&self) -> u64 {
        u64::from(self.page_index) * u64::from(self.page_size)
    }

    /// Moves the cursor to the next page
    pub fn advance(&mut self) {
        self.page_index += 1;
    }
}

/// One page of search results as returned by an adapter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResultPage {
    /// Detail page URLs, in the order the source listed them
    pub detail_links: Vec<String>,
    /// Whether the source advertises another page after this one
    pub has_next: bool,
}
