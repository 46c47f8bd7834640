//! The traversal engine: budgeted crawl loop, visited/domain accounting,
//! and the mode planner that decides where a session starts.

mod budget;
mod explorer;
mod planner;

pub use budget::{DomainBudget, VisitedSet};
pub use explorer::Explorer;
pub use planner::{CrawlMode, CrawlPlan, CrawlPlanner, GapAnalysis};
