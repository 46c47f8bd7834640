//! `ferret explore <name>` runs one full crawl session for an entity,
//! from planning through the final report.

use crate::acquisition::{HeuristicAnalyzer, HtmlSearchProvider, HttpFetcher};
use crate::cli::output::{self, Styled};
use crate::config::{self, Config};
use crate::entity::{EntityProfile, EntityType, IntelCategory};
use crate::explore::{CrawlMode, CrawlPlanner, Explorer};
use crate::extraction::HeuristicExtractor;
use crate::learning::CrawlLearner;
use crate::storage::{IntelStore, JsonlStore, MemoryStore, PageRecord};
use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Args)]
pub struct ExploreArgs {
    /// Entity name to investigate
    pub name: String,

    /// Kind of entity
    #[arg(long = "type", value_enum, default_value = "company")]
    pub entity_type: EntityType,

    /// Crawl mode
    #[arg(long, value_enum, default_value = "discovery")]
    pub mode: CrawlMode,

    /// Entity id for targeting mode (defaults to a slug of the name)
    #[arg(long)]
    pub entity_id: Option<String>,

    /// Extra seed URLs pushed alongside the planned ones
    #[arg(long = "seed")]
    pub seeds: Vec<String>,

    /// Geographic hint used in search queries
    #[arg(long)]
    pub location: Option<String>,

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

/// Run the explore command.
pub async fn run(args: ExploreArgs, config_path: Option<&Path>) -> Result<()> {
    let s = Styled::new();
    let start = Instant::now();

    let mut config = Config::load(config_path)?;
    if let Some(n) = args.max_pages {
        config.crawl.max_total_pages = n;
    }
    if let Some(d) = args.max_depth {
        config.crawl.max_depth = d;
    }

    let mut profile = EntityProfile::new(&args.name, args.entity_type)
        .with_official_domains(args.official_domains.clone())
        .with_aliases(args.aliases.clone());
    if let Some(location) = &args.location {
        profile = profile.with_location(location);
    }

    let store: Arc<dyn IntelStore> = if args.no_store {
        Arc::new(MemoryStore::new())
    } else {
        let path = match &args.output {
            Some(p) => p.clone(),
            None => default_session_path(),
        };
        if !output::is_quiet() && !output::is_json() {
            eprintln!("  {}", s.dim(&format!("session log: {}", path.display())));
        }
        Arc::new(JsonlStore::open(&path)?)
    };

    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let search = Arc::new(HtmlSearchProvider::new(
        fetcher.clone(),
        config.crawl.search_url_template.clone(),
    ));
    let planner = CrawlPlanner::new(
        store.clone(),
        search,
        config.crawl.search_results_per_query,
    );
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
            "  Exploring {} ({}, {} mode)",
            s.bold(&args.name),
            args.entity_type.as_str(),
            args.mode.as_str()
        );
        eprintln!();
    }

    let spinner = crawl_spinner();
    let plan = planner
        .plan(
            explorer.profile(),
            args.mode,
            args.entity_id.as_deref(),
            explorer.learner(),
        )
        .await;
    let mut seeds = args.seeds.clone();
    for seed in &plan.seeds {
        if !seeds.contains(seed) {
            seeds.push(seed.clone());
        }
    }
    spinner.set_message(format!("crawling from {} seeds", seeds.len()));
    let results = explorer.explore(&seeds).await;
    spinner.finish_and_clear();

    if output::is_json() {
        print_explore_json(&explorer, &plan.queries, &results, start.elapsed());
        return Ok(());
    }

    print_explore_report(&s, &explorer, &results, start.elapsed());
    Ok(())
}

/// Where this session's JSONL log lands by default.
pub(crate) fn default_session_path() -> PathBuf {
    let session = uuid::Uuid::new_v4().to_string();
    config::ferret_home().join("sessions").join(format!(
        "{}-{}.jsonl",
        chrono::Utc::now().format("%Y%m%d-%H%M%S"),
        &session[..8]
    ))
}

pub(crate) fn crawl_spinner() -> ProgressBar {
    if output::is_quiet() || output::is_json() || !output::color_enabled() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Print the session summary in branded format.
pub(crate) fn print_explore_report(
    s: &Styled,
    explorer: &Explorer,
    results: &std::collections::HashMap<String, PageRecord>,
    elapsed: std::time::Duration,
) {
    let mut pages: Vec<&PageRecord> = results.values().collect();
    pages.sort_by(|a, b| b.score.total_cmp(&a.score));

    eprintln!(
        "  Crawl complete in {} ({} pages)",
        output::format_duration(elapsed.as_secs()),
        pages.len()
    );
    eprintln!();

    if !pages.is_empty() {
        output::print_section(s, "Pages");
        for page in pages.iter().take(10) {
            let sym = if page.has_high_confidence_intel {
                s.ok_sym().to_string()
            } else {
                s.dim("-")
            };
            eprintln!(
                "    {sym} [{:>3.0}] {:<9} {}",
                page.score,
                page.page_type.as_str(),
                page.url
            );
            if output::is_verbose() {
                eprintln!("          {}", s.dim(&page.score_reason));
            }
        }
        if pages.len() > 10 {
            eprintln!("    {}", s.dim(&format!("... and {} more", pages.len() - 10)));
        }
        eprintln!();
    }

    let entity = explorer.entity_intel();
    output::print_section(s, "Findings");
    if entity.has_data() {
        for category in IntelCategory::ALL {
            let findings = entity.intel.findings(category);
            if findings.is_empty() {
                continue;
            }
            eprintln!(
                "    {:<14} {}",
                category.as_str(),
                s.cyan(&findings.len().to_string())
            );
            for finding in findings.iter().take(3) {
                let mark = if finding.verified {
                    s.green("*")
                } else {
                    s.dim("*")
                };
                eprintln!("      {mark} {}", finding.statement);
            }
        }
        if let Some(name) = &entity.intel.basic_info.official_name {
            eprintln!("    {:<14} {}", "official name", name);
        }
        if let Some(founded) = &entity.intel.basic_info.founded {
            eprintln!("    {:<14} {}", "founded", founded);
        }
    } else {
        eprintln!("    {}", s.dim("nothing extracted this session"));
    }
    eprintln!();

    let stats = explorer.learner().learning_stats();
    eprintln!(
        "  {}: {} outcomes, {} domains tracked, {} reliable",
        s.bold("Learner"),
        stats.recorded_outcomes,
        stats.tracked_domains,
        stats.reliable_domains
    );
}

/// Print the session summary as JSON.
pub(crate) fn print_explore_json(
    explorer: &Explorer,
    queries: &[String],
    results: &std::collections::HashMap<String, PageRecord>,
    elapsed: std::time::Duration,
) {
    let stats = explorer.learner().learning_stats();
    output::print_json(&serde_json::json!({
        "entity_id": explorer.entity_id(),
        "queries": queries,
        "pages": results.values().collect::<Vec<_>>(),
        "intel": explorer.entity_intel(),
        "learner": {
            "recorded_outcomes": stats.recorded_outcomes,
            "tracked_domains": stats.tracked_domains,
            "tracked_patterns": stats.tracked_patterns,
            "reliable_domains": stats.reliable_domains,
        },
        "duration_ms": elapsed.as_millis(),
    }));
}
