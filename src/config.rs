//! Runtime configuration: crawl budgets, fetch behavior, scoring weight
//! tables, and learning parameters. Loaded once at startup and treated as
//! immutable from then on.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Root directory for persistent state (`~/.ferret/`).
pub fn ferret_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".ferret")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A configured per-domain scoring entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPattern {
    pub domain: String,
    pub weight: f32,
    /// Official domains get the flat +150 bonus and mark the domain as
    /// belonging to the entity.
    #[serde(default)]
    pub official: bool,
}

/// A configured URL regex entry; first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlPattern {
    pub pattern: String,
    pub weight: f32,
}

/// Weight tables consulted by the URL scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub domain_patterns: Vec<DomainPattern>,
    pub url_patterns: Vec<UrlPattern>,
    /// Minimum score a discovered link needs to enter the frontier.
    pub score_threshold: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let domain = |domain: &str, weight: f32| DomainPattern {
            domain: domain.to_string(),
            weight,
            official: false,
        };
        let url = |pattern: &str, weight: f32| UrlPattern {
            pattern: pattern.to_string(),
            weight,
        };
        Self {
            domain_patterns: vec![
                domain("wikipedia.org", 40.0),
                domain("linkedin.com", 35.0),
                domain("crunchbase.com", 45.0),
                domain("opencorporates.com", 45.0),
                domain("sec.gov", 45.0),
                domain("bloomberg.com", 30.0),
                domain("reuters.com", 30.0),
                domain("github.com", 25.0),
                domain("x.com", 20.0),
                domain("twitter.com", 20.0),
                domain("facebook.com", 15.0),
            ],
            url_patterns: vec![
                url(r"/about(-us)?(/|$)", 35.0),
                url(r"/(team|people|leadership|management)(/|$)", 30.0),
                url(r"/(investors?|ir)(/|$)", 30.0),
                url(r"/(news|press|media)(/|$)", 25.0),
                url(r"/wiki/", 25.0),
                url(r"/(products?|services)(/|$)", 20.0),
                url(r"/contact(s)?(/|$)", 20.0),
                url(r"/(careers?|jobs)(/|$)", 15.0),
            ],
            score_threshold: 50.0,
        }
    }
}

/// Traversal budgets. These are hard limits: the crawl loop terminates or
/// skips rather than exceed any of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub max_total_pages: usize,
    pub max_depth: usize,
    pub max_pages_per_domain: usize,
    /// Search endpoint used to resolve planner queries into seed URLs;
    /// `{query}` is replaced with the percent-encoded query.
    pub search_url_template: String,
    /// How many organic results to take per search query.
    pub search_results_per_query: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_total_pages: 30,
            max_depth: 3,
            max_pages_per_domain: 5,
            search_url_template: "https://html.duckduckgo.com/html/?q={query}".to_string(),
            search_results_per_query: 5,
        }
    }
}

/// HTTP fetch behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Minimum gap between successive requests to the same host.
    pub min_delay_ms: u64,
    pub respect_robots: bool,
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("ferret/{} (+https://github.com/ferret-osint/ferret)", env!("CARGO_PKG_VERSION")),
            timeout_secs: 20,
            min_delay_ms: 500,
            respect_robots: true,
            max_body_bytes: 2_000_000,
        }
    }
}

/// Cross-session learning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Multiplier applied to frontier-score adjustments.
    pub learning_rate: f32,
    /// Days until a domain's reliability decays to its floor.
    pub decay_days: f32,
    /// Snapshot-persist cadence, in recorded outcomes.
    pub snapshot_every: usize,
    /// Ring-buffer capacity for recent outcomes.
    pub outcome_buffer: usize,
    /// Where learner snapshots live; defaults to `~/.ferret/learner.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            decay_days: 30.0,
            snapshot_every: 50,
            outcome_buffer: 1000,
            snapshot_path: None,
        }
    }
}

impl LearningConfig {
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot_path
            .clone()
            .unwrap_or_else(|| ferret_home().join("learner.json"))
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub fetch: FetchConfig,
    pub scoring: ScoringConfig,
    pub learning: LearningConfig,
}

impl Config {
    /// Load from an explicit path, or from `~/.ferret/config.json` when
    /// none is given. A missing default file yields `Config::default()`;
    /// a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (ferret_home().join("config.json"), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }
}
