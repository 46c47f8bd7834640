//! `ferret stats` inspects what the cross-session learner has picked up.

use crate::cli::output::{self, Styled};
use crate::config::Config;
use crate::entity::EntityType;
use crate::learning::CrawlLearner;
use anyhow::Result;
use clap::Args;
use std::path::Path;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Entity type whose learned patterns and domains to show
    #[arg(long = "type", value_enum, default_value = "company")]
    pub entity_type: EntityType,
}

/// Run the stats command.
pub async fn run(args: StatsArgs, config_path: Option<&Path>) -> Result<()> {
    let s = Styled::new();
    let config = Config::load(config_path)?;
    let snapshot_path = config.learning.snapshot_path();
    let learner = CrawlLearner::load_or_new(config.learning.clone());

    let stats = learner.learning_stats();
    let patterns = learner.successful_patterns(args.entity_type);
    let domains = learner.successful_domains(args.entity_type);

    if output::is_json() {
        let domains: Vec<serde_json::Value> = domains
            .iter()
            .map(|(domain, successes)| {
                serde_json::json!({
                    "domain": domain,
                    "successes": successes,
                    "reliability": learner.domain_reliability(domain),
                })
            })
            .collect();
        output::print_json(&serde_json::json!({
            "snapshot": snapshot_path,
            "stats": stats,
            "entity_type": args.entity_type,
            "patterns": patterns,
            "domains": domains,
        }));
        return Ok(());
    }

    output::print_header(&s);
    eprintln!("  {}", s.dim(&format!("snapshot: {}", snapshot_path.display())));
    eprintln!();

    output::print_section(&s, "Learner");
    eprintln!("    outcomes recorded          {}", stats.recorded_outcomes);
    eprintln!("    domains tracked            {}", stats.tracked_domains);
    eprintln!("    patterns tracked           {}", stats.tracked_patterns);
    eprintln!("    high-confidence patterns   {}", stats.high_confidence_patterns);
    eprintln!("    reliable domains           {}", stats.reliable_domains);
    eprintln!();

    if stats.recorded_outcomes == 0 {
        eprintln!(
            "  {}",
            s.dim("nothing recorded yet; run `ferret explore` to start learning")
        );
        return Ok(());
    }

    output::print_section(&s, &format!("Patterns ({})", args.entity_type.as_str()));
    if patterns.is_empty() {
        eprintln!("    {}", s.dim("none above the confidence bar yet"));
    }
    for p in &patterns {
        let hints: Vec<&str> = p.extraction_hints.iter().map(String::as_str).collect();
        let hints = if hints.is_empty() {
            String::new()
        } else {
            s.dim(&format!("  [{}]", hints.join(", ")))
        };
        eprintln!(
            "    {:<10} confidence {:.2}  quality {:.2}  ({}/{} pages){hints}",
            p.page_type.as_str(),
            p.confidence,
            p.avg_quality,
            p.success_count,
            p.total_count,
        );
    }
    eprintln!();

    output::print_section(&s, &format!("Domains ({})", args.entity_type.as_str()));
    if domains.is_empty() {
        eprintln!("    {}", s.dim("no productive domains yet"));
    }
    for (domain, successes) in domains.iter().take(15) {
        let reliability = learner.domain_reliability(domain);
        let shaded = if reliability >= 0.6 {
            s.green(&format!("{reliability:.2}"))
        } else if reliability >= 0.4 {
            format!("{reliability:.2}")
        } else {
            s.yellow(&format!("{reliability:.2}"))
        };
        eprintln!(
            "    {:<30} reliability {shaded}  {} extraction(s)",
            domain, successes
        );
    }

    Ok(())
}
