//! `ferret plan <name>` shows what the next crawl session would do,
//! without fetching anything beyond search results.

use crate::acquisition::{HtmlSearchProvider, HttpFetcher};
use crate::cli::output::{self, Styled};
use crate::config::Config;
use crate::entity::{EntityProfile, EntityType};
use crate::explore::{CrawlMode, CrawlPlanner};
use crate::learning::CrawlLearner;
use crate::storage::{IntelStore, MemoryStore};
use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Entity name to plan for
    pub name: String,

    /// Kind of entity
    #[arg(long = "type", value_enum, default_value = "company")]
    pub entity_type: EntityType,

    /// Crawl mode
    #[arg(long, value_enum, default_value = "discovery")]
    pub mode: CrawlMode,

    /// Entity id for targeting mode
    #[arg(long)]
    pub entity_id: Option<String>,

    /// Session log from a previous crawl to analyze gaps against
    #[arg(long)]
    pub intel: Option<PathBuf>,

    /// Geographic hint used in search queries
    #[arg(long)]
    pub location: Option<String>,

    /// Domain known to belong to the entity (repeatable)
    #[arg(long = "official-domain")]
    pub official_domains: Vec<String>,

    /// Alternate name the entity goes by (repeatable)
    #[arg(long = "alias")]
    pub aliases: Vec<String>,
}

/// Run the plan command.
pub async fn run(args: PlanArgs, config_path: Option<&Path>) -> Result<()> {
    let s = Styled::new();
    let config = Config::load(config_path)?;

    let mut profile = EntityProfile::new(&args.name, args.entity_type)
        .with_official_domains(args.official_domains.clone())
        .with_aliases(args.aliases.clone());
    if let Some(location) = &args.location {
        profile = profile.with_location(location);
    }

    let store: Arc<dyn IntelStore> = match &args.intel {
        Some(path) => Arc::new(MemoryStore::from_session_log(path).await?),
        None => Arc::new(MemoryStore::new()),
    };
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let search = Arc::new(HtmlSearchProvider::new(
        fetcher,
        config.crawl.search_url_template.clone(),
    ));
    let planner = CrawlPlanner::new(store, search, config.crawl.search_results_per_query);
    let learner = CrawlLearner::load_or_new(config.learning.clone());

    let plan = planner
        .plan(&profile, args.mode, args.entity_id.as_deref(), &learner)
        .await;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "mode": plan.mode,
            "queries": plan.queries,
            "seeds": plan.seeds,
            "gaps": plan.gaps,
        }));
        return Ok(());
    }

    output::print_header(&s);
    eprintln!(
        "  Plan for {} ({}, {} mode)",
        s.bold(&args.name),
        args.entity_type.as_str(),
        plan.mode.as_str()
    );
    eprintln!();

    if let Some(gaps) = &plan.gaps {
        output::print_section(&s, "Gaps");
        let pct = (gaps.completeness * 100.0).round();
        eprintln!("    completeness  {}%", pct);
        if !gaps.priority_gaps.is_empty() {
            let names: Vec<&str> = gaps.priority_gaps.iter().map(|c| c.as_str()).collect();
            eprintln!("    priority      {}", s.yellow(&names.join(", ")));
        }
        if !gaps.missing_fields.is_empty() {
            let names: Vec<&str> = gaps.missing_fields.iter().map(|c| c.as_str()).collect();
            eprintln!("    missing       {}", s.dim(&names.join(", ")));
        }
        eprintln!();
    }

    output::print_section(&s, "Queries");
    for query in &plan.queries {
        eprintln!("    {query}");
    }
    eprintln!();

    output::print_section(&s, "Seeds");
    if plan.seeds.is_empty() {
        eprintln!("    {}", s.dim("none resolved (is the search endpoint reachable?)"));
    }
    for seed in plan.seeds.iter().take(15) {
        eprintln!("    {seed}");
    }
    if plan.seeds.len() > 15 {
        eprintln!(
            "    {}",
            s.dim(&format!("... and {} more", plan.seeds.len() - 15))
        );
    }
    eprintln!();
    eprintln!(
        "  Run it with: ferret explore {:?} --mode {}",
        args.name,
        plan.mode.as_str()
    );

    Ok(())
}
