//! Ferret binary entry point: argument parsing, logging setup, dispatch.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ferret_runtime::cli::{crawl_cmd, explore_cmd, plan_cmd, score_cmd, stats_cmd};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ferret")]
#[command(author, version, about = "Adaptive open-web intelligence crawler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (default: ~/.ferret/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show scoring detail in reports
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the open web for intelligence about an entity
    Explore(explore_cmd::ExploreArgs),
    /// Crawl outward from explicit seed URLs, no planning or search
    Crawl(crawl_cmd::CrawlArgs),
    /// Show the queries and seeds the next crawl would start from
    Plan(plan_cmd::PlanArgs),
    /// Explain how the frontier would score specific URLs
    Score(score_cmd::ScoreArgs),
    /// Inspect what the cross-session learner has picked up
    Stats(stats_cmd::StatsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Output flags travel via env so every module can check them without
    // threading a flags struct through the call graph.
    if cli.json {
        std::env::set_var("FERRET_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("FERRET_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("FERRET_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("FERRET_NO_COLOR", "1");
    }

    let directive = if cli.verbose {
        "ferret=debug"
    } else if cli.quiet {
        "ferret=warn"
    } else {
        "ferret=info"
    };
    // Logs go to stderr; stdout is reserved for --json payloads.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Explore(args) => explore_cmd::run(args, config_path).await,
        Commands::Crawl(args) => crawl_cmd::run(args, config_path).await,
        Commands::Plan(args) => plan_cmd::run(args, config_path).await,
        Commands::Score(args) => score_cmd::run(args, config_path).await,
        Commands::Stats(args) => stats_cmd::run(args, config_path).await,
    }
}
