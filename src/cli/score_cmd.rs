//! `ferret score <name> <url>...` explains how the frontier would rank
//! specific URLs for an entity, before and after learned adjustments.

use crate::cli::output::{self, Styled};
use crate::config::Config;
use crate::entity::{EntityProfile, EntityType, PageType};
use crate::learning::CrawlLearner;
use crate::scheduler::UrlScorer;
use anyhow::Result;
use clap::Args;
use std::path::Path;

#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// Entity name the URLs would be crawled for
    pub name: String,

    /// URLs to score
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Kind of entity
    #[arg(long = "type", value_enum, default_value = "company")]
    pub entity_type: EntityType,

    /// Crawl depth to score at (seeds are depth 0)
    #[arg(long, default_value_t = 0)]
    pub depth: usize,

    /// Domain known to belong to the entity (repeatable)
    #[arg(long = "official-domain")]
    pub official_domains: Vec<String>,

    /// Alternate name the entity goes by (repeatable)
    #[arg(long = "alias")]
    pub aliases: Vec<String>,
}

/// Run the score command.
pub async fn run(args: ScoreArgs, config_path: Option<&Path>) -> Result<()> {
    let s = Styled::new();
    let config = Config::load(config_path)?;

    let profile = EntityProfile::new(&args.name, args.entity_type)
        .with_official_domains(args.official_domains.clone())
        .with_aliases(args.aliases.clone());
    let scorer = UrlScorer::new(&profile, &config.scoring);
    let learner = CrawlLearner::load_or_new(config.learning.clone());
    let threshold = config.scoring.score_threshold;

    if output::is_json() {
        let scored: Vec<serde_json::Value> = args
            .urls
            .iter()
            .map(|url| {
                let (score, reason) = scorer.score_url(url, "", args.depth);
                let adapted = if score > 0.0 {
                    learner
                        .adapt_frontier_scoring(score, url, PageType::General, args.entity_type)
                        .clamp(0.0, 150.0)
                } else {
                    0.0
                };
                serde_json::json!({
                    "url": url,
                    "score": score,
                    "adapted_score": adapted,
                    "reason": reason,
                    "would_crawl": adapted >= threshold,
                })
            })
            .collect();
        output::print_json(&serde_json::json!({
            "entity": args.name,
            "depth": args.depth,
            "threshold": threshold,
            "urls": scored,
        }));
        return Ok(());
    }

    output::print_header(&s);
    eprintln!(
        "  Scoring {} URL(s) for {} at depth {} (threshold {})",
        args.urls.len(),
        s.bold(&args.name),
        args.depth,
        threshold
    );
    eprintln!();

    for url in &args.urls {
        let (score, reason) = scorer.score_url(url, "", args.depth);
        if score <= 0.0 {
            eprintln!("  {} {url}", s.fail_sym());
            eprintln!("      {}", s.red(&format!("rejected: {reason}")));
            eprintln!();
            continue;
        }
        let adapted = learner
            .adapt_frontier_scoring(score, url, PageType::General, args.entity_type)
            .clamp(0.0, 150.0);
        let marker = if adapted >= threshold {
            s.ok_sym()
        } else {
            s.warn_sym()
        };
        eprintln!("  {marker} {url}");
        let verdict = if adapted >= threshold {
            s.green("would crawl")
        } else {
            s.yellow("below threshold")
        };
        if (adapted - score).abs() > f32::EPSILON {
            eprintln!(
                "      {:.0} heuristic, {:.0} after learning, {verdict}",
                score, adapted
            );
        } else {
            eprintln!("      {:.0}, {verdict}", score);
        }
        eprintln!("      {}", s.dim(&reason));
        eprintln!();
    }

    Ok(())
}
