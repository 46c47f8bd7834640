//! The crawl loop: pop the most promising candidate, fetch it, extract
//! intelligence, persist what we found, and enqueue the outgoing links
//! that look worth the budget.

use crate::acquisition::{ContentAnalyzer, FetchOutcome, PageFetcher};
use crate::config::Config;
use crate::entity::{EntityIntel, EntityProfile, IntelCategory, PageType};
use crate::extraction::{ExtractionResult, IntelExtractor};
use crate::learning::CrawlLearner;
use crate::scheduler::{CrawlCandidate, Frontier, PatternUsage, ScorerEvent, UrlScorer};
use crate::storage::{IntelStore, PageRecord};
use crate::web;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::budget::{DomainBudget, VisitedSet};

/// Findings below this confidence are not worth a verification pass.
const VERIFY_MIN_CONFIDENCE: f32 = 60.0;
/// Verification budget per page.
const MAX_VERIFICATIONS: usize = 5;

/// One crawl session for one entity. Owns the frontier, the scorer and
/// the learner; talks to fetch, extraction and persistence through
/// injected collaborators.
pub struct Explorer {
    profile: EntityProfile,
    entity_id: String,
    config: Config,
    scorer: UrlScorer,
    learner: CrawlLearner,
    fetcher: Arc<dyn PageFetcher>,
    analyzer: Arc<dyn ContentAnalyzer>,
    extractor: Arc<dyn IntelExtractor>,
    store: Arc<dyn IntelStore>,
    entity: EntityIntel,
    /// Per-pattern (uses, successes) counts for this session.
    pattern_tallies: HashMap<String, (u32, u32)>,
}

impl Explorer {
    pub fn new(
        profile: EntityProfile,
        config: Config,
        learner: CrawlLearner,
        fetcher: Arc<dyn PageFetcher>,
        analyzer: Arc<dyn ContentAnalyzer>,
        extractor: Arc<dyn IntelExtractor>,
        store: Arc<dyn IntelStore>,
    ) -> Self {
        let scorer = UrlScorer::new(&profile, &config.scoring);
        let entity_id = profile.normalized_name().replace(' ', "-");
        let entity = EntityIntel::new(&entity_id);
        Self {
            profile,
            entity_id,
            config,
            scorer,
            learner,
            fetcher,
            analyzer,
            extractor,
            store,
            entity,
            pattern_tallies: HashMap::new(),
        }
    }

    /// Use a caller-supplied entity id instead of one derived from the
    /// profile name.
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = entity_id.into();
        self.entity = EntityIntel::new(&self.entity_id);
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn profile(&self) -> &EntityProfile {
        &self.profile
    }

    pub fn scorer(&self) -> &UrlScorer {
        &self.scorer
    }

    pub fn learner(&self) -> &CrawlLearner {
        &self.learner
    }

    pub fn into_learner(self) -> CrawlLearner {
        self.learner
    }

    /// Intelligence accumulated for the entity across this session.
    pub fn entity_intel(&self) -> &EntityIntel {
        &self.entity
    }

    /// Crawl outward from `seeds` until the frontier drains or the page
    /// budget is spent. Returns one record per fetched-and-extracted
    /// page, keyed by normalized URL.
    pub async fn explore(&mut self, seeds: &[String]) -> HashMap<String, PageRecord> {
        let mut results: HashMap<String, PageRecord> = HashMap::new();
        let mut frontier = Frontier::new();
        let mut visited = VisitedSet::new();
        let mut budget = DomainBudget::new(self.config.crawl.max_pages_per_domain);

        match self.store.load_entity(&self.entity_id).await {
            Ok(Some(known)) => self.entity = known,
            Ok(None) => {}
            Err(e) => warn!("could not load prior intel for {}: {e}", self.entity_id),
        }

        for seed in seeds {
            let url = web::normalize_url(seed);
            let (score, reason) = self.scorer.score_url(&url, "", 0);
            if score <= 0.0 {
                debug!("seed rejected ({reason}): {url}");
                continue;
            }
            let adapted = self
                .learner
                .adapt_frontier_scoring(score, &url, PageType::General, self.profile.entity_type)
                .clamp(0.0, 150.0);
            frontier.push(CrawlCandidate::new(url, 0, "", adapted, reason));
        }
        info!(
            "exploring for '{}' from {} seeds (budget: {} pages)",
            self.profile.name,
            frontier.len(),
            self.config.crawl.max_total_pages
        );

        while results.len() < self.config.crawl.max_total_pages {
            let Some(candidate) = frontier.pop() else {
                break;
            };

            if visited.contains(&candidate.url) {
                continue;
            }
            if candidate.depth > self.config.crawl.max_depth {
                debug!("too deep ({}): {}", candidate.depth, candidate.url);
                continue;
            }
            let domain = web::domain_of(&candidate.url);
            if !budget.try_take(&domain) {
                debug!("domain budget spent for {domain}: {}", candidate.url);
                continue;
            }
            visited.insert(&candidate.url);

            debug!(
                "fetching [{:.0}] depth {} {}",
                candidate.score, candidate.depth, candidate.url
            );
            let page = match self.fetcher.fetch(&candidate.url, candidate.depth).await {
                FetchOutcome::Success(page) => page,
                outcome => {
                    warn!("fetch failed ({}): {}", outcome.label(), candidate.url);
                    continue;
                }
            };
            visited.insert(&web::normalize_url(&page.final_url));

            let text = self.analyzer.html_to_text(&page.html);
            let metadata = self.analyzer.extract_metadata(&page.html);
            let links = self.analyzer.extract_links(&page.final_url, &page.html);
            let final_domain = web::domain_of(&page.final_url);

            let mut page_type = self.analyzer.detect_page_type(
                &page.final_url,
                &metadata,
                self.profile.entity_type,
            );
            if self
                .profile
                .official_domains
                .iter()
                .any(|d| web::domain_matches(&final_domain, &web::domain_of(&format!("https://{d}"))))
            {
                page_type = PageType::Official;
            }

            let strategy =
                self.learner
                    .suggest_page_strategy(&page.final_url, page_type, self.profile.entity_type);

            let mut intel = match self
                .extractor
                .extract(
                    &self.profile,
                    &text,
                    &metadata,
                    page_type,
                    &page.final_url,
                    &self.entity,
                    &strategy,
                )
                .await
            {
                ExtractionResult::Success(intel) => intel,
                ExtractionResult::Timeout => {
                    warn!("extraction timed out: {}", page.final_url);
                    self.record_outcome(&page.final_url, page_type, 0.0, false, &[]);
                    continue;
                }
                ExtractionResult::ParseError { message } => {
                    warn!("extraction failed for {}: {message}", page.final_url);
                    self.record_outcome(&page.final_url, page_type, 0.0, false, &[]);
                    continue;
                }
            };

            if intel.is_empty() {
                debug!("no intelligence on {}", page.final_url);
                self.record_outcome(&page.final_url, page_type, 0.0, false, &[]);
                continue;
            }

            let mut verified = 0usize;
            'verify: for category in IntelCategory::ALL {
                let Some(findings) = intel.findings_mut(category) else {
                    continue;
                };
                for finding in findings.iter_mut() {
                    if verified >= MAX_VERIFICATIONS {
                        break 'verify;
                    }
                    if finding.confidence < VERIFY_MIN_CONFIDENCE {
                        continue;
                    }
                    let check = self.extractor.verify(&self.profile, finding).await;
                    finding.verified = check.verified;
                    finding.confidence = check.confidence;
                    verified += 1;
                }
            }

            let quality = intel.quality();
            let has_high_confidence = intel.has_high_confidence();
            if has_high_confidence {
                self.scorer.observe(ScorerEvent::HighConfidenceDomainObserved {
                    domain: final_domain.clone(),
                });
            }

            let categories = intel.touched_categories();
            let hints: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
            self.record_outcome(&page.final_url, page_type, quality, true, &hints);

            let record = PageRecord {
                url: candidate.url.clone(),
                final_url: page.final_url.clone(),
                domain: final_domain.clone(),
                title: metadata.title.clone(),
                page_type,
                depth: candidate.depth,
                score: candidate.score,
                score_reason: candidate.reason.clone(),
                text_chars: text.chars().count(),
                links_found: links.len(),
                findings_count: intel.finding_count(),
                has_high_confidence_intel: has_high_confidence,
                fetched_at: Utc::now(),
            };

            if let Err(e) = self.store.save_page(&record).await {
                warn!("failed to persist page {}: {e}", candidate.url);
            }
            if let Err(e) = self.store.save_links(&page.final_url, &links).await {
                warn!("failed to persist links for {}: {e}", page.final_url);
            }
            if let Err(e) = self
                .store
                .save_intelligence(&self.entity_id, &page.final_url, &intel)
                .await
            {
                warn!("failed to persist intel for {}: {e}", page.final_url);
            }
            for finding in intel.findings(IntelCategory::Relationships) {
                if !finding.verified {
                    continue;
                }
                let other = finding.detail.as_deref().unwrap_or(&finding.statement);
                if let Err(e) = self
                    .store
                    .save_relationship(&self.entity_id, other, "mentioned")
                    .await
                {
                    warn!("failed to persist relationship from {}: {e}", page.final_url);
                }
            }
            self.entity.absorb(&page.final_url, &intel);

            info!(
                "explored [{:.0}] {} ({}, {} findings)",
                candidate.score,
                candidate.url,
                page_type.as_str(),
                intel.finding_count()
            );
            results.insert(candidate.url.clone(), record);

            let next_depth = candidate.depth + 1;
            if next_depth > self.config.crawl.max_depth {
                continue;
            }

            let ranked = self
                .extractor
                .rank_links(&self.profile, &page.final_url, &text, &links)
                .await;
            let mut external: HashMap<String, f32> = HashMap::new();
            for r in &ranked {
                let key = web::normalize_url(&r.url);
                let entry = external.entry(key).or_insert(0.0);
                *entry = entry.max(r.score);
            }

            let mut enqueued = 0usize;
            for link in &links {
                let url = web::normalize_url(&link.url);
                if visited.contains(&url) {
                    continue;
                }
                let (heuristic, reason) = self.scorer.score_url(&url, &link.text, next_depth);
                if heuristic <= 0.0 {
                    continue;
                }
                let adapted = self
                    .learner
                    .adapt_frontier_scoring(heuristic, &url, page_type, self.profile.entity_type)
                    .clamp(0.0, 150.0);
                let best = adapted.max(external.get(&url).copied().unwrap_or(0.0));
                if best < self.config.scoring.score_threshold {
                    continue;
                }
                frontier.push(CrawlCandidate::new(url, next_depth, &link.text, best, reason));
                enqueued += 1;
            }
            debug!(
                "enqueued {enqueued} of {} links from {}",
                links.len(),
                page.final_url
            );
        }

        let usages: Vec<PatternUsage> = self
            .pattern_tallies
            .iter()
            .map(|(pattern, &(uses, successes))| PatternUsage {
                pattern: pattern.clone(),
                uses,
                successes,
            })
            .collect();
        self.scorer.update_pattern_weights(&usages);

        if self.entity.has_data() {
            if let Err(e) = self.store.save_entity(&self.entity).await {
                warn!("failed to persist entity record {}: {e}", self.entity_id);
            }
        }
        if let Err(e) = self.learner.save() {
            warn!("failed to save learner state: {e}");
        }
        info!(
            "exploration finished: {} pages, {} findings for '{}'",
            results.len(),
            self.entity.intel.finding_count(),
            self.profile.name
        );
        results
    }

    /// Forward one completed crawl outcome to every learning channel:
    /// the scorer's session-local domain records, the learner's
    /// cross-session statistics, and the per-pattern tallies that feed
    /// the end-of-session weight update.
    fn record_outcome(
        &mut self,
        url: &str,
        page_type: PageType,
        quality: f32,
        success: bool,
        hints: &[&str],
    ) {
        if let Some(pattern) = self.scorer.matching_url_pattern(url).map(str::to_string) {
            let tally = self.pattern_tallies.entry(pattern).or_insert((0, 0));
            tally.0 += 1;
            if success {
                tally.1 += 1;
            }
        }
        let domain = web::domain_of(url);
        self.scorer.learn_domain_pattern(&domain, success, quality);
        self.learner.record_crawl_result(
            url,
            page_type,
            quality,
            success,
            self.profile.entity_type,
            serde_json::json!({ "extraction_hints": hints }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{FetchedPage, HeuristicAnalyzer};
    use crate::config::LearningConfig;
    use crate::entity::EntityType;
    use crate::extraction::HeuristicExtractor;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    /// Serves canned HTML by exact normalized URL; 404 for the rest.
    struct ScriptedFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str, _depth: usize) -> FetchOutcome {
            match self.pages.get(url) {
                Some(html) => FetchOutcome::Success(FetchedPage {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    status: 200,
                    html: html.clone(),
                }),
                None => FetchOutcome::HttpError { status: 404 },
            }
        }
    }

    fn page(title: &str, body: &str, links: &[(&str, &str)]) -> String {
        let anchors: String = links
            .iter()
            .map(|(href, text)| format!("<a href=\"{href}\">{text}</a>"))
            .collect();
        format!(
            "<html><head><title>{title}</title></head>\
             <body><p>{body}</p>{anchors}</body></html>"
        )
    }

    fn acme_site() -> HashMap<String, String> {
        let mut pages = HashMap::new();
        pages.insert(
            "https://acmerobotics.example".to_string(),
            page(
                "Acme Robotics",
                "Acme Robotics builds warehouse automation robots.",
                &[
                    ("/about", "About Acme Robotics"),
                    ("/team", "Acme team"),
                    ("/news", "Acme news"),
                ],
            ),
        );
        pages.insert(
            "https://acmerobotics.example/about".to_string(),
            page(
                "About | Acme Robotics",
                "Acme Robotics was founded in 2015. John Smith is CEO of Acme Robotics. \
                 The company is headquartered in Austin, Texas and has 250 employees.",
                &[("/team", "Acme team")],
            ),
        );
        pages.insert(
            "https://acmerobotics.example/team".to_string(),
            page(
                "Team | Acme Robotics",
                "The Acme Robotics leadership team. Maria Garcia is CTO of Acme.",
                &[],
            ),
        );
        pages.insert(
            "https://acmerobotics.example/news".to_string(),
            page(
                "News | Acme Robotics",
                "Acme Robotics raised $40 million in funding this year.",
                &[],
            ),
        );
        pages
    }

    fn test_explorer(
        pages: HashMap<String, String>,
        configure: impl FnOnce(&mut Config),
        snapshot_dir: &std::path::Path,
    ) -> (Explorer, Arc<MemoryStore>) {
        let mut config = Config::default();
        config.fetch.min_delay_ms = 0;
        config.learning = LearningConfig {
            snapshot_path: Some(snapshot_dir.join("learner.json")),
            ..LearningConfig::default()
        };
        configure(&mut config);

        let profile = EntityProfile::new("Acme Robotics", EntityType::Company)
            .with_official_domains(vec!["acmerobotics.example".into()]);
        let learner = CrawlLearner::new(config.learning.clone());
        let store = Arc::new(MemoryStore::new());
        let explorer = Explorer::new(
            profile,
            config,
            learner,
            Arc::new(ScriptedFetcher { pages }),
            Arc::new(HeuristicAnalyzer),
            Arc::new(HeuristicExtractor::default()),
            store.clone(),
        );
        (explorer, store)
    }

    #[tokio::test]
    async fn test_explore_respects_total_page_budget() {
        let dir = tempfile::tempdir().unwrap();
        let (mut explorer, store) =
            test_explorer(acme_site(), |c| c.crawl.max_total_pages = 2, dir.path());

        let results = explorer
            .explore(&["https://acmerobotics.example/".to_string()])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(store.page_count().await, 2);
        assert!(results.contains_key("https://acmerobotics.example"));
    }

    #[tokio::test]
    async fn test_explore_never_revisits_a_url() {
        let dir = tempfile::tempdir().unwrap();
        // Every page links to /team, so it gets enqueued repeatedly.
        let (mut explorer, _store) = test_explorer(acme_site(), |_| {}, dir.path());

        let results = explorer
            .explore(&[
                "https://acmerobotics.example/".to_string(),
                "https://acmerobotics.example".to_string(),
            ])
            .await;

        let team_records = results
            .keys()
            .filter(|u| u.as_str() == "https://acmerobotics.example/team")
            .count();
        assert_eq!(team_records, 1);
        assert!(results.len() <= 4);
    }

    #[tokio::test]
    async fn test_domain_budget_limits_one_host() {
        let dir = tempfile::tempdir().unwrap();
        let (mut explorer, _store) =
            test_explorer(acme_site(), |c| c.crawl.max_pages_per_domain = 1, dir.path());

        let results = explorer
            .explore(&["https://acmerobotics.example/".to_string()])
            .await;

        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_depth_zero_stays_on_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let (mut explorer, _store) =
            test_explorer(acme_site(), |c| c.crawl.max_depth = 0, dir.path());

        let results = explorer
            .explore(&["https://acmerobotics.example/".to_string()])
            .await;

        assert_eq!(results.len(), 1);
        assert!(results.contains_key("https://acmerobotics.example"));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let (mut explorer, store) =
            test_explorer(HashMap::new(), |_| {}, dir.path());

        let results = explorer
            .explore(&["https://acmerobotics.example/".to_string()])
            .await;

        assert!(results.is_empty());
        assert_eq!(store.page_count().await, 0);
        assert_eq!(explorer.learner().recent_outcomes().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_extraction_records_failed_outcome_without_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = HashMap::new();
        pages.insert(
            "https://unrelated.example".to_string(),
            page("Something Else", "A page about nothing in particular.", &[]),
        );
        let (mut explorer, store) = test_explorer(pages, |_| {}, dir.path());

        let results = explorer
            .explore(&["https://unrelated.example/".to_string()])
            .await;

        assert!(results.is_empty());
        assert_eq!(store.page_count().await, 0);
        let outcomes: Vec<_> = explorer.learner().recent_outcomes().collect();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].extraction_success);
    }

    #[tokio::test]
    async fn test_high_confidence_intel_boosts_domain_for_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut explorer, _store) =
            test_explorer(acme_site(), |c| c.crawl.max_total_pages = 1, dir.path());

        let results = explorer
            .explore(&["https://acmerobotics.example/about".to_string()])
            .await;

        assert_eq!(results.len(), 1);
        let record = &results["https://acmerobotics.example/about"];
        assert!(record.has_high_confidence_intel);

        let (_, reason) = explorer
            .scorer()
            .score_url("https://acmerobotics.example/investors", "", 1);
        assert!(reason.contains("session boost"), "reason: {reason}");
    }

    #[tokio::test]
    async fn test_outcomes_flow_to_learner() {
        let dir = tempfile::tempdir().unwrap();
        let (mut explorer, _store) = test_explorer(acme_site(), |_| {}, dir.path());

        let results = explorer
            .explore(&["https://acmerobotics.example/".to_string()])
            .await;

        assert!(!results.is_empty());
        let stats = explorer.learner().learning_stats();
        assert_eq!(stats.recorded_outcomes as usize, results.len());
        assert!(stats.tracked_domains >= 1);
        assert!(explorer.entity_intel().has_data());
    }

    #[tokio::test]
    async fn test_official_domain_overrides_page_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = HashMap::new();
        // A bare page with no official markers; only the profile says
        // this domain belongs to the entity.
        pages.insert(
            "https://acmerobotics.example/misc".to_string(),
            page("Acme Robotics misc", "Acme Robotics miscellany of notes.", &[]),
        );
        let (mut explorer, _store) = test_explorer(pages, |_| {}, dir.path());

        let results = explorer
            .explore(&["https://acmerobotics.example/misc".to_string()])
            .await;

        assert_eq!(
            results["https://acmerobotics.example/misc"].page_type,
            PageType::Official
        );
    }

    #[tokio::test]
    async fn test_pattern_tallies_earn_weight_delta_after_five_uses() {
        let dir = tempfile::tempdir().unwrap();
        let items: Vec<(String, String)> = (1..=5)
            .map(|i| (format!("/news/item{i}"), format!("Acme news {i}")))
            .collect();
        let links: Vec<(&str, &str)> = items
            .iter()
            .map(|(href, text)| (href.as_str(), text.as_str()))
            .collect();
        let mut pages = HashMap::new();
        pages.insert(
            "https://acmerobotics.example".to_string(),
            page("Acme Robotics", "Acme Robotics builds robots.", &links),
        );
        for (href, _) in &items {
            pages.insert(
                format!("https://acmerobotics.example{href}"),
                page("Acme news", "Acme Robotics announced Widget Labs.", &[]),
            );
        }
        let (mut explorer, _store) =
            test_explorer(pages, |c| c.crawl.max_pages_per_domain = 10, dir.path());

        let results = explorer
            .explore(&["https://acmerobotics.example/".to_string()])
            .await;

        // Five successful news-section crawls push the pattern over the
        // five-use threshold with a perfect success rate.
        assert_eq!(results.len(), 6);
        assert_eq!(
            explorer.scorer().pattern_weight(r"/(news|press|media)(/|$)"),
            Some(10.0)
        );
    }

    #[tokio::test]
    async fn test_verified_relationships_reach_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut pages = HashMap::new();
        pages.insert(
            "https://acmerobotics.example/about".to_string(),
            page(
                "About | Acme Robotics",
                "Acme Robotics is a subsidiary of Megacorp Industries.",
                &[],
            ),
        );
        let (mut explorer, store) = test_explorer(pages, |_| {}, dir.path());

        explorer
            .explore(&["https://acmerobotics.example/about".to_string()])
            .await;

        assert_eq!(store.relationship_count().await, 1);
    }
}
