//! Page acquisition: polite HTTP fetching, robots.txt handling, and
//! HTML content analysis.

mod content;
mod fetch;
mod robots;
mod search;

pub use content::{ContentAnalyzer, ExtractedLink, HeuristicAnalyzer, PageMetadata};
pub use fetch::{FetchOutcome, FetchedPage, HttpFetcher, PageFetcher, RateLimiter};
pub use robots::{parse_robots, RobotsCache, RobotsRules};
pub use search::{HtmlSearchProvider, SearchProvider};
