//! Multi-factor URL scoring: how promising is a link for the entity we
//! are investigating, given static weight tables, the entity profile, and
//! what this scorer has learned about domains so far.

use crate::config::{DomainPattern, ScoringConfig};
use crate::entity::{EntityProfile, EntityType};
use crate::web;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::warn;

const BASE_SCORE: f32 = 40.0;
const TOPIC_KEYWORD_BONUS: f32 = 30.0;
const NAME_WORD_BONUS: f32 = 50.0;
const OFFICIAL_BONUS: f32 = 150.0;
const NAME_DOMAIN_BONUS: f32 = 40.0;
const TYPE_KEYWORD_BONUS: f32 = 20.0;
const NAME_ECHO_BONUS: f32 = 15.0;
const DEPTH_PENALTY: f32 = 5.0;
const SCORE_CEILING: f32 = 150.0;
/// Learned boosts below this magnitude are ignored as noise.
const LEARNED_NOISE_FLOOR: f32 = 0.1;
/// Session boost applied when a domain yields high-confidence intel.
const HIGH_CONFIDENCE_BOOST: f32 = 25.0;

static SHARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(sharer\.php|/share\?|/intent/(tweet|post)|[?&]share=)").unwrap()
});

static AUTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(login|log-in|signin|sign-in|signup|sign-up|register|logout)([/?#]|$)")
        .unwrap()
});

static NEWSLETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(newsletter|subscribe|unsubscribe)([/?#]|$)").unwrap());

static FEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\.(rss|atom)$|/feed([/?#]|$)|/rss([/?#]|$))").unwrap());

static JUNK_SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(mailto:|tel:|javascript:)").unwrap());

/// Links that can never yield intelligence, whatever the entity.
fn is_junk(url: &str) -> bool {
    let url = url.trim();
    url.is_empty()
        || url.starts_with('#')
        || JUNK_SCHEME_RE.is_match(url)
        || SHARE_RE.is_match(url)
        || AUTH_RE.is_match(url)
        || NEWSLETTER_RE.is_match(url)
        || FEED_RE.is_match(url)
}

/// Session-local feedback consumed by [`UrlScorer::observe`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScorerEvent {
    /// The traversal loop extracted a verified high-confidence finding
    /// from a page on this domain.
    HighConfidenceDomainObserved { domain: String },
}

/// Per-domain outcome counters behind [`UrlScorer::learned_boost`].
#[derive(Debug, Clone, Default)]
struct DomainRecord {
    crawl_count: u32,
    success_count: u32,
    fail_count: u32,
    /// Sum of intel quality over successful crawls only.
    total_quality: f32,
}

/// Recorded usage of one URL pattern, fed to
/// [`UrlScorer::update_pattern_weights`].
#[derive(Debug, Clone)]
pub struct PatternUsage {
    pub pattern: String,
    pub uses: u32,
    pub successes: u32,
}

/// Scores candidate URLs for one entity profile.
///
/// `score_url` itself is a pure function of the candidate and the scorer's
/// current state; all state changes go through the explicit mutation
/// methods (`observe`, `learn_domain_pattern`, `set_official_domains`).
pub struct UrlScorer {
    entity_type: EntityType,
    name_words: Vec<String>,
    compact_name: String,
    topic_keywords: Vec<String>,
    domain_patterns: Vec<DomainPattern>,
    url_patterns: Vec<(String, Regex, f32)>,
    official_domains: HashSet<String>,
    session_boosts: HashMap<String, f32>,
    domain_records: HashMap<String, DomainRecord>,
    /// Deltas from `update_pattern_weights`, kept for inspection. The
    /// scoring loop does not read them back; see `pattern_weight`.
    pattern_weights: HashMap<String, f32>,
}

impl UrlScorer {
    pub fn new(profile: &EntityProfile, scoring: &ScoringConfig) -> Self {
        let url_patterns = scoring
            .url_patterns
            .iter()
            .filter_map(|p| match Regex::new(&p.pattern) {
                Ok(re) => Some((p.pattern.clone(), re, p.weight)),
                Err(e) => {
                    warn!("skipping invalid url pattern '{}': {e}", p.pattern);
                    None
                }
            })
            .collect();

        let mut scorer = Self {
            entity_type: profile.entity_type,
            name_words: profile.name_words(),
            compact_name: profile.compact_name(),
            topic_keywords: profile.topic_keywords(),
            domain_patterns: scoring.domain_patterns.clone(),
            url_patterns,
            official_domains: HashSet::new(),
            session_boosts: HashMap::new(),
            domain_records: HashMap::new(),
            pattern_weights: HashMap::new(),
        };
        scorer.set_official_domains(&profile.official_domains);
        scorer
    }

    /// Score a candidate URL. Returns the score in [0, 150] and a
    /// human-readable reason listing every rule that contributed.
    pub fn score_url(&self, url: &str, link_text: &str, depth: usize) -> (f32, String) {
        // Hard rejects run before any scoring or learned adjustment.
        if is_junk(url) {
            return (0.0, "Blacklisted pattern".to_string());
        }
        if !web::is_http(url) {
            return (0.0, "Non-HTTP URL".to_string());
        }

        let url_lower = url.to_lowercase();
        let text_lower = link_text.to_lowercase();
        let domain = web::domain_of(url);

        let mut score = BASE_SCORE;
        let mut reasons = vec![format!("base {BASE_SCORE:.0}")];

        // Topic keywords only apply to topic entities, and only in the URL
        if self.entity_type == EntityType::Topic {
            for kw in &self.topic_keywords {
                if url_lower.contains(kw.as_str()) {
                    score += TOPIC_KEYWORD_BONUS;
                    reasons.push(format!("topic keyword '{kw}' +{TOPIC_KEYWORD_BONUS:.0}"));
                }
            }
        }

        for word in &self.name_words {
            if url_lower.contains(word.as_str()) || text_lower.contains(word.as_str()) {
                score += NAME_WORD_BONUS;
                reasons.push(format!("name word '{word}' +{NAME_WORD_BONUS:.0}"));
            }
        }

        // Domain table: first matching entry wins, then stop scanning
        let mut official_credited = false;
        if self
            .official_domains
            .iter()
            .any(|d| web::domain_matches(&domain, d))
        {
            score += OFFICIAL_BONUS;
            reasons.push(format!("official domain +{OFFICIAL_BONUS:.0}"));
            official_credited = true;
        }
        for entry in &self.domain_patterns {
            if web::domain_matches(&domain, &entry.domain) {
                score += entry.weight;
                reasons.push(format!("known domain {} +{:.0}", entry.domain, entry.weight));
                if entry.official && !official_credited {
                    score += OFFICIAL_BONUS;
                    reasons.push(format!("official domain +{OFFICIAL_BONUS:.0}"));
                }
                break;
            }
        }

        if let Some(label) = web::second_level_label(&domain) {
            if !self.compact_name.is_empty() && label == self.compact_name {
                score += NAME_DOMAIN_BONUS;
                reasons.push(format!("name-domain match +{NAME_DOMAIN_BONUS:.0}"));
            }
        }

        // URL patterns: first match wins
        for (pattern, re, weight) in &self.url_patterns {
            if re.is_match(&url_lower) {
                score += weight;
                reasons.push(format!("url pattern '{pattern}' +{weight:.0}"));
                break;
            }
        }

        for kw in self.entity_type.url_keywords() {
            if url_lower.contains(kw) || text_lower.contains(kw) {
                score += TYPE_KEYWORD_BONUS;
                reasons.push(format!("type keyword '{kw}' +{TYPE_KEYWORD_BONUS:.0}"));
            }
        }

        // Second, smaller name pass over the same word set
        for word in &self.name_words {
            if url_lower.contains(word.as_str()) || text_lower.contains(word.as_str()) {
                score += NAME_ECHO_BONUS;
                reasons.push(format!("name word '{word}' +{NAME_ECHO_BONUS:.0}"));
            }
        }

        if let Some(boost) = self.session_boosts.get(&domain) {
            if *boost != 0.0 {
                score += boost;
                reasons.push(format!("session boost {boost:+.0}"));
            }
        }

        let learned = self.learned_boost(&domain);
        if learned.abs() > LEARNED_NOISE_FLOOR {
            score += learned;
            reasons.push(format!("learned boost {learned:+.1}"));
        }

        if depth > 0 {
            let penalty = DEPTH_PENALTY * depth as f32;
            score -= penalty;
            reasons.push(format!("depth -{penalty:.0}"));
        }

        (score.clamp(0.0, SCORE_CEILING), reasons.join("; "))
    }

    /// Record one crawl outcome against the URL's domain.
    pub fn learn_domain_pattern(&mut self, domain: &str, success: bool, intel_quality: f32) {
        let record = self.domain_records.entry(domain.to_string()).or_default();
        record.crawl_count += 1;
        if success {
            record.success_count += 1;
            record.total_quality += intel_quality;
        } else {
            record.fail_count += 1;
        }
    }

    /// Score adjustment earned by a domain's crawl history.
    ///
    /// Needs at least 3 recorded crawls; below that, always 0. A success
    /// rate in [0.3, 0.5) deliberately yields no adjustment either way.
    pub fn learned_boost(&self, domain: &str) -> f32 {
        let Some(record) = self.domain_records.get(domain) else {
            return 0.0;
        };
        if record.crawl_count < 3 {
            return 0.0;
        }
        let success_rate = record.success_count as f32 / record.crawl_count as f32;
        let avg_quality = if record.success_count > 0 {
            record.total_quality / record.success_count as f32
        } else {
            0.0
        };
        if success_rate >= 0.7 {
            avg_quality * 30.0
        } else if success_rate >= 0.5 {
            avg_quality * 15.0
        } else if success_rate < 0.3 {
            -20.0
        } else {
            0.0
        }
    }

    /// Fold pattern usage reports into stored weight deltas.
    ///
    /// Patterns need at least 5 recorded uses to earn a delta. The deltas
    /// are observable through `pattern_weight` but are not applied inside
    /// `score_url`'s pattern loop.
    pub fn update_pattern_weights(&mut self, usages: &[PatternUsage]) {
        for usage in usages {
            if usage.uses < 5 {
                continue;
            }
            let rate = usage.successes as f32 / usage.uses as f32;
            let delta = if rate >= 0.8 {
                10.0
            } else if rate >= 0.6 {
                5.0
            } else if rate < 0.3 {
                -10.0
            } else {
                continue;
            };
            self.pattern_weights.insert(usage.pattern.clone(), delta);
        }
    }

    /// Stored weight delta for a pattern string, if any.
    pub fn pattern_weight(&self, pattern: &str) -> Option<f32> {
        self.pattern_weights.get(pattern).copied()
    }

    /// The configured URL pattern `score_url` would credit for this URL.
    /// Callers tally these per crawl outcome and feed the tallies back
    /// through `update_pattern_weights`.
    pub fn matching_url_pattern(&self, url: &str) -> Option<&str> {
        let url_lower = url.to_lowercase();
        self.url_patterns
            .iter()
            .find(|(_, re, _)| re.is_match(&url_lower))
            .map(|(pattern, _, _)| pattern.as_str())
    }

    /// Cumulative additive session-local boost for a domain.
    pub fn boost_domain(&mut self, domain: &str, amount: f32) {
        *self.session_boosts.entry(domain.to_string()).or_default() += amount;
    }

    /// Apply traversal feedback.
    pub fn observe(&mut self, event: ScorerEvent) {
        match event {
            ScorerEvent::HighConfidenceDomainObserved { domain } => {
                self.boost_domain(&domain, HIGH_CONFIDENCE_BOOST);
            }
        }
    }

    /// Mark additional domains as official.
    pub fn set_official_domains(&mut self, domains: &[String]) {
        for d in domains {
            let d = d.trim().to_lowercase();
            let d = d.strip_prefix("www.").unwrap_or(&d).to_string();
            if !d.is_empty() {
                self.official_domains.insert(d);
            }
        }
    }
}
