//! Domain types shared by the crawl engine, the adapters and the store
//!
//! - `SourceId`: the closed set of repositories this crate knows how to crawl
//! - `RawRecord`: what an adapter extracts from a detail page
//! - `NewRecord` / `Record`: normalized records before and after insertion
//! - `PageCursor` / `SearchResultPage`: ephemeral pagination types

mod date;
mod page;
mod record;
mod source;

pub use date::parse_publication_date;
pub use page::{PageCursor, SearchResultPage};
pub use record::{NewRecord, RawRecord, Record, RequiredField};
pub use source::SourceId;
