//! Ferret: an adaptive crawler for open-web entity intelligence.
//!
//! Point it at an entity (a company, a person, a news story, a topic) and it
//! plans search queries, seeds a scored frontier, and explores the web under
//! hard page/depth/domain budgets, extracting structured findings as it goes.
//! Every crawl feeds a persistent learner, so later sessions rank domains and
//! page types by what actually produced intelligence before.
//!
//! The crate splits along the crawl pipeline:
//!
//! - [`entity`]: profiles of the crawl subject and the intelligence
//!   accumulated about it
//! - [`scheduler`]: the priority frontier and the URL scorer that feeds it
//! - [`acquisition`]: polite HTTP fetching, robots handling, HTML analysis,
//!   and search-result seeding
//! - [`extraction`]: heuristic intelligence extraction from page text
//! - [`learning`]: cross-session domain/page-type statistics and frontier
//!   score adaptation
//! - [`explore`]: the traversal engine and the mode planner that drive a
//!   whole session
//! - [`storage`]: the persistence boundary, with in-memory and
//!   append-only JSONL stores

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod entity;
pub mod explore;
pub mod extraction;
pub mod learning;
pub mod scheduler;
pub mod storage;
pub mod web;
