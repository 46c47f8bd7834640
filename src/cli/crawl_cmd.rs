//! `ferret crawl <name> <url>...` crawls explicit seed URLs for an
//! entity, skipping the planner and the search endpoint entirely.

use crate::acquisition::{HeuristicAnalyzer, HttpFetcher};
use crate::cli::explore_cmd;
use crate::cli::output::{self, Styled};
use crate::config::Config;
use crate::entity::{EntityProfile, EntityType};
use crate::explore::Explorer;
use crate::extraction::HeuristicExtractor;
use crate::learning::CrawlLearner;
use crate::storage::{IntelStore, JsonlStore, MemoryStore};
use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Entity name to investigate
    pub name: String,

    /// Seed URLs to crawl outward from
    #[arg(required = true)]
    pub seeds: Vec<String>,

    /// Kind of entity
    #[arg(long = "type", value_enum, default_value = "company")]
    pub entity_type: EntityType,

    /// Entity id (defaults to a slug of the name)
    #[arg(long)]
    pub entity_id: Option<String>,

    /// Domain known to belong to the entity (repeatable)
    #[arg(long = "official-domain")]
    pub official_domains: Vec<String>,

    /// Alternate name the entity goes by (repeatable)
    #[arg(long = "alias")]
    pub aliases: Vec<String>,

    /// Page budget for this session
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Link-following depth limit
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Write session output to this JSONL file instead of the default
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Keep results in memory only, skip the session log
    #[arg(long)]
    pub no_store: bool,
}

/// Run the crawl command.
pub async fn run(args: CrawlArgs, config_path: Option<&Path>) -> Result<()> {
    let s = Styled::new();
    let start = Instant::now();

    let mut config = Config::load(config_path)?;
    if let Some(n) = args.max_pages {
        config.crawl.max_total_pages = n;
    }
    if let Some(d) = args.max_depth {
        config.crawl.max_depth = d;
    }

    let profile = EntityProfile::new(&args.name, args.entity_type)
        .with_official_domains(args.official_domains.clone())
        .with_aliases(args.aliases.clone());

    let store: Arc<dyn IntelStore> = if args.no_store {
        Arc::new(MemoryStore::new())
    } else {
        let path = match &args.output {
            Some(p) => p.clone(),
            None => explore_cmd::default_session_path(),
        };
        if !output::is_quiet() && !output::is_json() {
            eprintln!("  {}", s.dim(&format!("session log: {}", path.display())));
        }
        Arc::new(JsonlStore::open(&path)?)
    };

    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let learner = CrawlLearner::load_or_new(config.learning.clone());
    let mut explorer = Explorer::new(
        profile,
        config,
        learner,
        fetcher,
        Arc::new(HeuristicAnalyzer),
        Arc::new(HeuristicExtractor::default()),
        store,
    );
    if let Some(id) = &args.entity_id {
        explorer = explorer.with_entity_id(id.clone());
    }

    if !output::is_quiet() && !output::is_json() {
        output::print_header(&s);
        eprintln!(
            "  Crawling {} seeds for {}",
            args.seeds.len(),
            s.bold(&args.name)
        );
        eprintln!();
    }

    let spinner = explore_cmd::crawl_spinner();
    spinner.set_message(format!("crawling from {} seeds", args.seeds.len()));
    let results = explorer.explore(&args.seeds).await;
    spinner.finish_and_clear();

    if output::is_json() {
        explore_cmd::print_explore_json(&explorer, &[], &results, start.elapsed());
        return Ok(());
    }

    explore_cmd::print_explore_report(&s, &explorer, &results, start.elapsed());
    Ok(())
}
