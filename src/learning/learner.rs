//! The cross-session learning engine: folds crawl outcomes into domain
//! reliability and page-type patterns, and feeds adjusted expectations
//! back into scoring and extraction.

use super::snapshot::{self, LearnerSnapshot, SNAPSHOT_VERSION};
use super::stats::{
    pattern_key, CrawlOutcome, DomainStats, EntityTypeMemory, LearningStats, PageStrategy,
    PageTypePattern,
};
use crate::config::LearningConfig;
use crate::entity::{EntityType, PageType};
use crate::web;
use anyhow::Result;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Fixed chunk size handed to the extraction collaborator.
const EXTRACTION_CHUNK_SIZE: usize = 4000;

/// Owns all learned state for a session. Single writer: the traversal
/// loop records outcomes in completion order, nothing else mutates.
pub struct CrawlLearner {
    config: LearningConfig,
    domains: HashMap<String, DomainStats>,
    patterns: HashMap<String, PageTypePattern>,
    entity_memory: HashMap<EntityType, EntityTypeMemory>,
    /// Ring buffer of recent outcomes for diagnostics.
    recent: VecDeque<CrawlOutcome>,
    outcomes_recorded: u64,
}

impl CrawlLearner {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            config,
            domains: HashMap::new(),
            patterns: HashMap::new(),
            entity_memory: HashMap::new(),
            recent: VecDeque::new(),
            outcomes_recorded: 0,
        }
    }

    /// Restore from the configured snapshot if one exists and is
    /// readable; anything else starts fresh with a warning.
    pub fn load_or_new(config: LearningConfig) -> Self {
        let path = config.snapshot_path();
        match snapshot::load(&path) {
            Ok(Some(snap)) if snap.version == SNAPSHOT_VERSION => {
                debug!(
                    "loaded learner snapshot: {} domains, {} patterns",
                    snap.domains.len(),
                    snap.patterns.len()
                );
                let mut learner = Self::new(config);
                learner.outcomes_recorded = snap.outcomes_recorded;
                learner.domains = snap.domains;
                learner.patterns = snap.patterns;
                learner.entity_memory = snap.entity_memory;
                learner
            }
            Ok(Some(snap)) => {
                warn!(
                    "learner snapshot has unsupported version {}, starting fresh",
                    snap.version
                );
                Self::new(config)
            }
            Ok(None) => Self::new(config),
            Err(e) => {
                warn!("failed to load learner snapshot: {e:#}");
                Self::new(config)
            }
        }
    }

    /// Fold one completed page cycle into every statistic the learner
    /// keeps. Fires the best-effort snapshot hook on cadence.
    pub fn record_crawl_result(
        &mut self,
        url: &str,
        page_type: PageType,
        intel_quality: f32,
        extraction_success: bool,
        entity_type: EntityType,
        metadata: serde_json::Value,
    ) {
        let domain = {
            let d = web::domain_of(url);
            if d.is_empty() {
                "unknown".to_string()
            } else {
                d
            }
        };
        let outcome = CrawlOutcome {
            url: url.to_string(),
            domain: domain.clone(),
            page_type,
            entity_type,
            intel_quality: intel_quality.clamp(0.0, 1.0),
            extraction_success,
            timestamp: Utc::now(),
            metadata,
        };
        let hints = outcome.extraction_hints();
        let now = outcome.timestamp;

        self.domains
            .entry(domain.clone())
            .or_insert_with(|| DomainStats::new(domain.clone(), now))
            .record(&outcome);

        self.patterns
            .entry(pattern_key(entity_type, page_type))
            .or_insert_with(|| PageTypePattern::new(entity_type, page_type))
            .record(extraction_success, outcome.intel_quality, &hints);

        if extraction_success {
            *self
                .entity_memory
                .entry(entity_type)
                .or_default()
                .successful_domains
                .entry(domain)
                .or_default() += 1;
        }

        self.recent.push_back(outcome);
        while self.recent.len() > self.config.outcome_buffer {
            self.recent.pop_front();
        }

        self.outcomes_recorded += 1;
        if self.config.snapshot_every > 0
            && self.outcomes_recorded % self.config.snapshot_every as u64 == 0
        {
            if let Err(e) = self.save() {
                warn!("learner snapshot failed: {e:#}");
            }
        }
    }

    /// Composite estimate in [0, 0.8] of how likely a domain is to keep
    /// yielding good extractions. Unseen domains get the neutral 0.5.
    pub fn domain_reliability(&self, domain: &str) -> f32 {
        let Some(stats) = self.domains.get(domain) else {
            return 0.5;
        };
        if stats.total_crawls == 0 {
            return 0.5;
        }
        let age_days = (Utc::now() - stats.last_seen).num_seconds().max(0) as f32 / 86_400.0;
        let decay_factor = (1.0 - age_days / self.config.decay_days).max(0.0);
        let reliability =
            (stats.success_rate() * 0.4 + stats.avg_intel_quality * 0.4) * (0.8 + decay_factor * 0.2);
        reliability.clamp(0.0, 0.8)
    }

    /// Extraction guidance for an upcoming page, from whatever the
    /// learner has seen about this domain and page-type combination.
    pub fn suggest_page_strategy(
        &self,
        url: &str,
        page_type: PageType,
        entity_type: EntityType,
    ) -> PageStrategy {
        let domain = web::domain_of(url);
        let domain_reliability = self.domain_reliability(&domain);
        let pattern = self.patterns.get(&pattern_key(entity_type, page_type));

        let mut expected_quality = pattern.map(|p| p.avg_quality).unwrap_or(0.5);
        if let Some(stats) = self.domains.get(&domain) {
            // A domain with real history beats the page-type prior
            if stats.total_crawls >= 5 {
                expected_quality = stats.avg_intel_quality;
            }
        }

        // Timeouts adapt only once a pattern exists; an unseen
        // combination keeps the neutral default.
        let recommended_timeout_secs = match pattern {
            Some(p) if p.confidence > 0.8 => 90,
            Some(p) if p.confidence < 0.3 => 150,
            _ => 120,
        };

        PageStrategy {
            domain_reliability,
            expected_quality,
            extraction_hints: pattern
                .map(|p| p.extraction_hints.iter().cloned().collect())
                .unwrap_or_default(),
            confidence: pattern.map(|p| p.confidence).unwrap_or(0.0),
            recommended_timeout_secs,
            chunk_size: EXTRACTION_CHUNK_SIZE,
        }
    }

    /// Top patterns for an entity type: confidence above 0.5, sorted by
    /// confidence times quality, at most 10.
    pub fn successful_patterns(&self, entity_type: EntityType) -> Vec<PageTypePattern> {
        let mut matching: Vec<PageTypePattern> = self
            .patterns
            .values()
            .filter(|p| p.entity_type == entity_type && p.confidence > 0.5)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            (b.confidence * b.avg_quality).total_cmp(&(a.confidence * a.avg_quality))
        });
        matching.truncate(10);
        matching
    }

    /// Adjust a frontier score using learned domain reliability and
    /// pattern quality. No clamping here; the scorer's own ceiling
    /// applies where the result is used as a score.
    pub fn adapt_frontier_scoring(
        &self,
        base_score: f32,
        url: &str,
        page_type: PageType,
        entity_type: EntityType,
    ) -> f32 {
        let domain = web::domain_of(url);
        let reliability = self.domain_reliability(&domain);
        let mut adjustment = if reliability > 0.7 {
            20.0
        } else if reliability < 0.3 {
            -15.0
        } else {
            0.0
        };
        if let Some(pattern) = self.patterns.get(&pattern_key(entity_type, page_type)) {
            if pattern.confidence > 0.6 {
                adjustment += pattern.avg_quality * 25.0;
            }
        }
        base_score + adjustment * self.config.learning_rate
    }

    pub fn learning_stats(&self) -> LearningStats {
        LearningStats {
            tracked_domains: self.domains.len(),
            tracked_patterns: self.patterns.len(),
            recorded_outcomes: self.outcomes_recorded,
            high_confidence_patterns: self.patterns.values().filter(|p| p.confidence > 0.7).count(),
            reliable_domains: self
                .domains
                .keys()
                .filter(|d| self.domain_reliability(d) > 0.7)
                .count(),
        }
    }

    /// Domains that produced successful extractions for this entity
    /// type, most productive first.
    pub fn successful_domains(&self, entity_type: EntityType) -> Vec<(String, u32)> {
        let mut domains: Vec<(String, u32)> = self
            .entity_memory
            .get(&entity_type)
            .map(|m| {
                m.successful_domains
                    .iter()
                    .map(|(d, n)| (d.clone(), *n))
                    .collect()
            })
            .unwrap_or_default();
        domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        domains
    }

    pub fn recent_outcomes(&self) -> impl Iterator<Item = &CrawlOutcome> {
        self.recent.iter()
    }

    pub fn snapshot(&self) -> LearnerSnapshot {
        LearnerSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            outcomes_recorded: self.outcomes_recorded,
            domains: self.domains.clone(),
            patterns: self.patterns.clone(),
            entity_memory: self.entity_memory.clone(),
        }
    }

    /// Persist current state to the configured snapshot path.
    pub fn save(&self) -> Result<()> {
        snapshot::save(&self.config.snapshot_path(), &self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn test_config(dir: &tempfile::TempDir) -> LearningConfig {
        LearningConfig {
            snapshot_path: Some(dir.path().join("learner.json")),
            ..LearningConfig::default()
        }
    }

    fn record_n(learner: &mut CrawlLearner, url: &str, n: usize, quality: f32, success: bool) {
        for _ in 0..n {
            learner.record_crawl_result(
                url,
                PageType::General,
                quality,
                success,
                EntityType::Company,
                Value::Null,
            );
        }
    }

    #[test]
    fn test_unseen_domain_reliability_is_neutral() {
        let dir = tempfile::tempdir().unwrap();
        let learner = CrawlLearner::new(test_config(&dir));
        assert_eq!(learner.domain_reliability("never-seen.example"), 0.5);
    }

    #[test]
    fn test_reliability_never_exceeds_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        record_n(&mut learner, "https://perfect.example/page", 20, 1.0, true);
        let r = learner.domain_reliability("perfect.example");
        assert!(r > 0.7, "perfect domain should be highly reliable, got {r}");
        assert!(r <= 0.8 + 1e-6, "reliability escaped cap: {r}");
    }

    #[test]
    fn test_reliability_bounded_for_mixed_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        for i in 0..30 {
            learner.record_crawl_result(
                "https://mixed.example/page",
                PageType::News,
                (i % 3) as f32 / 2.0,
                i % 4 != 0,
                EntityType::News,
                Value::Null,
            );
            let r = learner.domain_reliability("mixed.example");
            assert!((0.0..=0.8).contains(&r), "step {i}: reliability {r}");
        }
    }

    #[test]
    fn test_fresh_strategy_returns_neutral_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let learner = CrawlLearner::new(test_config(&dir));
        let strategy = learner.suggest_page_strategy(
            "https://new.example/about",
            PageType::Official,
            EntityType::Company,
        );
        assert_eq!(strategy.confidence, 0.0);
        assert_eq!(strategy.expected_quality, 0.5);
        assert_eq!(strategy.recommended_timeout_secs, 120);
        assert_eq!(strategy.chunk_size, 4000);
        assert!(strategy.extraction_hints.is_empty());
    }

    #[test]
    fn test_confident_pattern_shortens_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        // 12 successes: confidence 1.0 for company:general
        record_n(&mut learner, "https://a.example/p", 12, 0.8, true);
        let strategy = learner.suggest_page_strategy(
            "https://b.example/p",
            PageType::General,
            EntityType::Company,
        );
        assert_eq!(strategy.recommended_timeout_secs, 90);
    }

    #[test]
    fn test_weak_pattern_lengthens_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        // 1 failure: pattern exists with confidence 0
        record_n(&mut learner, "https://a.example/p", 1, 0.0, false);
        let strategy = learner.suggest_page_strategy(
            "https://b.example/p",
            PageType::General,
            EntityType::Company,
        );
        assert_eq!(strategy.recommended_timeout_secs, 150);
    }

    #[test]
    fn test_domain_history_overrides_expected_quality() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        record_n(&mut learner, "https://rich.example/p", 6, 0.9, true);
        let strategy = learner.suggest_page_strategy(
            "https://rich.example/other",
            PageType::Official,
            EntityType::Company,
        );
        // No company:official pattern exists, but the domain has 6 crawls
        assert!((strategy.expected_quality - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_adapt_frontier_scoring_rewards_reliable_domains() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        record_n(&mut learner, "https://good.example/p", 10, 1.0, true);

        let adjusted = learner.adapt_frontier_scoring(
            50.0,
            "https://good.example/next",
            PageType::News,
            EntityType::Person,
        );
        assert_eq!(adjusted, 70.0);
    }

    #[test]
    fn test_adapt_frontier_scoring_penalizes_unreliable_domains() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        record_n(&mut learner, "https://bad.example/p", 10, 0.0, false);

        let adjusted = learner.adapt_frontier_scoring(
            50.0,
            "https://bad.example/next",
            PageType::News,
            EntityType::Person,
        );
        assert_eq!(adjusted, 35.0);
    }

    #[test]
    fn test_adapt_frontier_scoring_adds_pattern_quality() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        // Confident company:general pattern at quality ~1.0
        record_n(&mut learner, "https://many1.example/p", 4, 1.0, true);
        record_n(&mut learner, "https://many2.example/p", 4, 1.0, true);
        record_n(&mut learner, "https://many3.example/p", 4, 1.0, true);

        let neutral_url = "https://unseen.example/next";
        let adjusted = learner.adapt_frontier_scoring(
            50.0,
            neutral_url,
            PageType::General,
            EntityType::Company,
        );
        // Unseen domain: no reliability term, only the pattern bonus
        assert!((adjusted - 75.0).abs() < 1e-4, "got {adjusted}");
    }

    #[test]
    fn test_learning_rate_scales_adjustment() {
        let dir = tempfile::tempdir().unwrap();
        let config = LearningConfig {
            learning_rate: 0.5,
            ..test_config(&dir)
        };
        let mut learner = CrawlLearner::new(config);
        record_n(&mut learner, "https://good.example/p", 10, 1.0, true);
        let adjusted = learner.adapt_frontier_scoring(
            50.0,
            "https://good.example/next",
            PageType::News,
            EntityType::Person,
        );
        assert_eq!(adjusted, 60.0);
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let config = LearningConfig {
            outcome_buffer: 10,
            snapshot_every: 0,
            ..test_config(&dir)
        };
        let mut learner = CrawlLearner::new(config);
        for i in 0..15 {
            learner.record_crawl_result(
                &format!("https://site{i}.example/p"),
                PageType::General,
                0.5,
                true,
                EntityType::Company,
                Value::Null,
            );
        }
        let recent: Vec<_> = learner.recent_outcomes().collect();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].domain, "site5.example");
        assert_eq!(learner.learning_stats().recorded_outcomes, 15);
    }

    #[test]
    fn test_snapshot_fires_on_cadence() {
        let dir = tempfile::tempdir().unwrap();
        let config = LearningConfig {
            snapshot_every: 3,
            ..test_config(&dir)
        };
        let path = config.snapshot_path();
        let mut learner = CrawlLearner::new(config);
        record_n(&mut learner, "https://a.example/p", 2, 0.5, true);
        assert!(!path.exists());
        record_n(&mut learner, "https://a.example/p", 1, 0.5, true);
        assert!(path.exists());
    }

    #[test]
    fn test_save_and_reload_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let mut learner = CrawlLearner::new(config.clone());
        record_n(&mut learner, "https://known.example/p", 8, 0.9, true);
        learner.save().unwrap();

        let restored = CrawlLearner::load_or_new(config);
        let r1 = learner.domain_reliability("known.example");
        let r2 = restored.domain_reliability("known.example");
        assert!((r1 - r2).abs() < 1e-5);
        assert_eq!(restored.learning_stats().recorded_outcomes, 8);
    }

    #[test]
    fn test_corrupt_snapshot_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        std::fs::write(config.snapshot_path(), "{broken").unwrap();
        let learner = CrawlLearner::load_or_new(config);
        assert_eq!(learner.learning_stats().recorded_outcomes, 0);
    }

    #[test]
    fn test_successful_domains_only_count_successes() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        record_n(&mut learner, "https://hit.example/p", 3, 0.8, true);
        record_n(&mut learner, "https://miss.example/p", 3, 0.0, false);
        let domains = learner.successful_domains(EntityType::Company);
        assert_eq!(domains, vec![("hit.example".to_string(), 3)]);
    }

    #[test]
    fn test_successful_patterns_filter_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        // official: 10 successes at high quality
        for _ in 0..10 {
            learner.record_crawl_result(
                "https://a.example/p",
                PageType::Official,
                0.9,
                true,
                EntityType::Company,
                Value::Null,
            );
        }
        // news: 6 of 12 successes, confidence 0.5 exactly: filtered out
        for i in 0..12 {
            learner.record_crawl_result(
                "https://b.example/p",
                PageType::News,
                0.4,
                i % 2 == 0,
                EntityType::Company,
                Value::Null,
            );
        }
        let patterns = learner.successful_patterns(EntityType::Company);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].page_type, PageType::Official);
    }

    #[test]
    fn test_learning_stats_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut learner = CrawlLearner::new(test_config(&dir));
        record_n(&mut learner, "https://one.example/p", 10, 0.95, true);
        let stats = learner.learning_stats();
        assert_eq!(stats.tracked_domains, 1);
        assert_eq!(stats.tracked_patterns, 1);
        assert_eq!(stats.recorded_outcomes, 10);
        assert_eq!(stats.high_confidence_patterns, 1);
        assert_eq!(stats.reliable_domains, 1);
    }
}
