//! Crawl scheduling: the priority frontier and the URL scorer that
//! decides what gets fetched next.

mod frontier;
mod scorer;

pub use frontier::{CrawlCandidate, Frontier};
pub use scorer::{PatternUsage, ScorerEvent, UrlScorer};
