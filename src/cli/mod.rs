//! CLI subcommand implementations for the Ferret binary.

pub mod crawl_cmd;
pub mod explore_cmd;
pub mod output;
pub mod plan_cmd;
pub mod score_cmd;
pub mod stats_cmd;
