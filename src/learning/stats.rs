//! Learner statistics records: per-domain reliability counters and
//! per-(entity type, page type) extraction patterns, both smoothed with
//! exponential moving averages.

use crate::entity::{EntityType, PageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// EMA smoothing factor: how hard one new outcome pulls the average.
pub const EMA_ALPHA: f32 = 0.3;

/// Immutable record of one completed page-processing cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub url: String,
    pub domain: String,
    pub page_type: PageType,
    pub entity_type: EntityType,
    pub intel_quality: f32,
    pub extraction_success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CrawlOutcome {
    /// Extraction hints carried in the outcome metadata, if any.
    pub fn extraction_hints(&self) -> Vec<String> {
        self.metadata
            .get("extraction_hints")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|h| h.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Everything the learner tracks about one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainStats {
    pub domain: String,
    pub total_crawls: u32,
    pub successful_crawls: u32,
    /// EMA over reported intel quality, updated on every crawl including
    /// failures. Always in [0, 1].
    pub avg_intel_quality: f32,
    #[serde(default)]
    pub page_type_distribution: HashMap<PageType, u32>,
    #[serde(default)]
    pub entity_type_distribution: HashMap<EntityType, u32>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl DomainStats {
    pub fn new(domain: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            domain: domain.into(),
            total_crawls: 0,
            successful_crawls: 0,
            avg_intel_quality: 0.0,
            page_type_distribution: HashMap::new(),
            entity_type_distribution: HashMap::new(),
            first_seen: now,
            last_seen: now,
        }
    }

    /// Fold one outcome in. Failed crawls still move the quality EMA;
    /// a stream of zero-quality failures is a real signal about the
    /// domain, not noise to discard.
    pub fn record(&mut self, outcome: &CrawlOutcome) {
        let quality = outcome.intel_quality.clamp(0.0, 1.0);
        if self.total_crawls == 0 {
            self.avg_intel_quality = quality;
        } else {
            self.avg_intel_quality = EMA_ALPHA * quality + (1.0 - EMA_ALPHA) * self.avg_intel_quality;
        }
        self.total_crawls += 1;
        if outcome.extraction_success {
            self.successful_crawls += 1;
        }
        *self
            .page_type_distribution
            .entry(outcome.page_type)
            .or_default() += 1;
        *self
            .entity_type_distribution
            .entry(outcome.entity_type)
            .or_default() += 1;
        self.last_seen = outcome.timestamp;
    }

    pub fn success_rate(&self) -> f32 {
        if self.total_crawls == 0 {
            0.0
        } else {
            self.successful_crawls as f32 / self.total_crawls as f32
        }
    }
}

/// Map key for a pattern: entity type and page type, colon-joined.
pub fn pattern_key(entity_type: EntityType, page_type: PageType) -> String {
    format!("{}:{}", entity_type.as_str(), page_type.as_str())
}

/// Learned behavior of one (entity type, page type) combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTypePattern {
    pub entity_type: EntityType,
    pub page_type: PageType,
    pub success_count: u32,
    pub total_count: u32,
    /// EMA over intel quality, same update rule as domain stats.
    pub avg_quality: f32,
    #[serde(default)]
    pub extraction_hints: BTreeSet<String>,
    /// Success rate damped by sample size: rate × min(1, total/10).
    pub confidence: f32,
}

impl PageTypePattern {
    pub fn new(entity_type: EntityType, page_type: PageType) -> Self {
        Self {
            entity_type,
            page_type,
            success_count: 0,
            total_count: 0,
            avg_quality: 0.0,
            extraction_hints: BTreeSet::new(),
            confidence: 0.0,
        }
    }

    pub fn key(&self) -> String {
        pattern_key(self.entity_type, self.page_type)
    }

    pub fn record(&mut self, success: bool, quality: f32, hints: &[String]) {
        let quality = quality.clamp(0.0, 1.0);
        if self.total_count == 0 {
            self.avg_quality = quality;
        } else {
            self.avg_quality = EMA_ALPHA * quality + (1.0 - EMA_ALPHA) * self.avg_quality;
        }
        self.total_count += 1;
        if success {
            self.success_count += 1;
        }
        self.extraction_hints.extend(hints.iter().cloned());
        let rate = self.success_count as f32 / self.total_count as f32;
        let ramp = (self.total_count as f32 / 10.0).min(1.0);
        self.confidence = rate * ramp;
    }
}

/// Per-entity-type memory of which domains keep paying off.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityTypeMemory {
    #[serde(default)]
    pub successful_domains: HashMap<String, u32>,
}

/// Extraction guidance for one upcoming page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageStrategy {
    pub domain_reliability: f32,
    pub expected_quality: f32,
    pub extraction_hints: Vec<String>,
    pub confidence: f32,
    pub recommended_timeout_secs: u64,
    pub chunk_size: usize,
}

/// Aggregate counters for introspection and the stats command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningStats {
    pub tracked_domains: usize,
    pub tracked_patterns: usize,
    pub recorded_outcomes: u64,
    pub high_confidence_patterns: usize,
    pub reliable_domains: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(quality: f32, success: bool) -> CrawlOutcome {
        CrawlOutcome {
            url: "https://example.com/page".to_string(),
            domain: "example.com".to_string(),
            page_type: PageType::General,
            entity_type: EntityType::Company,
            intel_quality: quality,
            extraction_success: success,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_ema_stays_in_unit_interval() {
        let mut stats = DomainStats::new("example.com", Utc::now());
        let qualities = [0.0, 1.0, 0.5, 1.0, 1.0, 0.0, 0.2, 0.9, 1.0, 0.0];
        for (i, q) in qualities.iter().enumerate() {
            stats.record(&outcome(*q, i % 2 == 0));
            assert!(
                (0.0..=1.0).contains(&stats.avg_intel_quality),
                "avg escaped range at step {i}: {}",
                stats.avg_intel_quality
            );
        }
        assert!(stats.successful_crawls <= stats.total_crawls);
    }

    #[test]
    fn test_first_outcome_initializes_average() {
        let mut stats = DomainStats::new("example.com", Utc::now());
        stats.record(&outcome(0.8, true));
        assert!((stats.avg_intel_quality - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_failures_still_move_the_average() {
        let mut stats = DomainStats::new("example.com", Utc::now());
        stats.record(&outcome(0.9, true));
        stats.record(&outcome(0.0, false));
        let expected = 0.7 * 0.9;
        assert!((stats.avg_intel_quality - expected).abs() < 1e-6);
        assert_eq!(stats.successful_crawls, 1);
        assert_eq!(stats.total_crawls, 2);
    }

    #[test]
    fn test_pattern_confidence_ramps_with_sample_size() {
        let mut pattern = PageTypePattern::new(EntityType::Company, PageType::Official);
        // 3 of 3 successes: rate 1.0 but only 30% of the sample ramp
        for _ in 0..3 {
            pattern.record(true, 0.8, &[]);
        }
        assert!((pattern.confidence - 0.3).abs() < 1e-6);
        for _ in 0..7 {
            pattern.record(true, 0.8, &[]);
        }
        assert!((pattern.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pattern_hints_union() {
        let mut pattern = PageTypePattern::new(EntityType::Company, PageType::Official);
        pattern.record(true, 0.5, &["json-ld".to_string()]);
        pattern.record(true, 0.5, &["json-ld".to_string(), "meta-og".to_string()]);
        assert_eq!(pattern.extraction_hints.len(), 2);
    }

    #[test]
    fn test_pattern_key_format() {
        assert_eq!(
            pattern_key(EntityType::Company, PageType::Official),
            "company:official"
        );
    }

    #[test]
    fn test_outcome_hints_from_metadata() {
        let mut o = outcome(0.5, true);
        o.metadata = serde_json::json!({"extraction_hints": ["table", "json-ld"]});
        assert_eq!(o.extraction_hints(), vec!["table", "json-ld"]);
        assert!(outcome(0.5, true).extraction_hints().is_empty());
    }
}
