/// Crawl loop state definitions
///
/// A loop moves `FetchPage -> FetchDetail -> Persist` and back to
/// `FetchPage` while the source advertises more pages, then ends in exactly
/// one terminal state.
use serde::Serialize;
use std::fmt;

/// Represents the current state of one source's crawl loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    // ===== Active States =====
    /// Requesting a result page
    FetchPage,

    /// Requesting the detail page of one link
    FetchDetail,

    /// Handing a fetched record to the persistence gate
    Persist,

    // ===== Terminal States =====
    /// The source reported no further pages
    Done,

    /// A result page could not be fetched
    Failed,

    /// The crawl was cancelled from outside
    Cancelled,
}

impl CrawlState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the loop may move from this state to `next`
    ///
    /// Any active state may fail or be cancelled. Terminal states never change.
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;

        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Failed | Cancelled) => true,
            // A page without links moves straight on to the next one
            (FetchPage, FetchPage | FetchDetail | Done) => true,
            (FetchDetail, Persist | FetchDetail | FetchPage | Done) => true,
            (Persist, FetchDetail | FetchPage | Done) => true,
            _ => false,
        }
    }

    /// Converts the state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::FetchPage => "fetch_page",
            Self::FetchDetail => "fetch_detail",
            Self::Persist => "persist",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::all_states()
            .into_iter()
            .find(|state| state.to_db_string() == s)
    }

    /// Returns all possible crawl states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::FetchPage,
            Self::FetchDetail,
            Self::Persist,
            Self::Done,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.to_db_string())
    }
}
