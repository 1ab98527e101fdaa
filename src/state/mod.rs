//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: Where a single source's crawl loop is in its lifecycle
//! - `CrawlStats`: Counters a crawl loop keeps while it runs
//! - `SourceState`: Per-source request timing used by the rate limiter

mod crawl_state;
mod crawl_stats;
mod source_state;

// Re-export main types
pub use crawl_state::CrawlState;
pub use crawl_stats::CrawlStats;
pub use source_state::SourceState;
