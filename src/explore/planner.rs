//! Crawl planning: look at what we already know about an entity, work
//! out what is missing, and turn that into a mode, search queries and
//! seed URLs for the next session.

use crate::acquisition::SearchProvider;
use crate::entity::{EntityProfile, EntityType, IntelCategory};
use crate::explore::Explorer;
use crate::learning::CrawlLearner;
use crate::storage::{IntelStore, PageRecord};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// How many search queries one plan may carry.
const QUERY_CAP: usize = 10;
/// How many remembered domains an expansion crawl re-seeds from.
const EXPANSION_DOMAIN_CAP: usize = 10;

/// What kind of crawl to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// First contact: broad queries to find where the entity lives.
    Discovery,
    /// Fill specific gaps in an entity we already hold intel on.
    Targeting,
    /// Re-seed from domains that paid off in earlier sessions.
    Expansion,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlMode::Discovery => "discovery",
            CrawlMode::Targeting => "targeting",
            CrawlMode::Expansion => "expansion",
        }
    }
}

impl std::fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What we know and do not know about one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapAnalysis {
    pub entity_id: String,
    pub has_data: bool,
    /// filled categories / 9.
    pub completeness: f32,
    pub missing_fields: Vec<IntelCategory>,
    pub priority_gaps: Vec<IntelCategory>,
}

/// A ready-to-run crawl session: effective mode, the queries behind it,
/// and the seed URLs to push.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlPlan {
    pub mode: CrawlMode,
    pub queries: Vec<String>,
    pub seeds: Vec<String>,
    pub gaps: Option<GapAnalysis>,
}

/// Plans crawls against stored intelligence and learner memory.
pub struct CrawlPlanner {
    store: Arc<dyn IntelStore>,
    search: Arc<dyn SearchProvider>,
    results_per_query: usize,
}

impl CrawlPlanner {
    pub fn new(
        store: Arc<dyn IntelStore>,
        search: Arc<dyn SearchProvider>,
        results_per_query: usize,
    ) -> Self {
        Self {
            store,
            search,
            results_per_query,
        }
    }

    /// Aggregate everything stored for `entity_id` into a per-category
    /// gap report. A store miss or failure reads as "nothing known".
    pub async fn analyze_entity_gaps(&self, entity_id: &str) -> GapAnalysis {
        let entity = match self.store.load_entity(entity_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!("gap analysis could not load {entity_id}: {e}");
                None
            }
        };

        let Some(entity) = entity else {
            return GapAnalysis {
                entity_id: entity_id.to_string(),
                has_data: false,
                completeness: 0.0,
                missing_fields: IntelCategory::ALL.to_vec(),
                priority_gaps: vec![
                    IntelCategory::BasicInfo,
                    IntelCategory::Persons,
                    IntelCategory::Locations,
                ],
            };
        };

        let missing_fields: Vec<IntelCategory> = IntelCategory::ALL
            .iter()
            .copied()
            .filter(|c| !entity.is_filled(*c))
            .collect();
        let filled = IntelCategory::ALL.len() - missing_fields.len();
        let completeness = filled as f32 / IntelCategory::ALL.len() as f32;

        let basic = &entity.intel.basic_info;
        let mut priority_gaps = Vec::new();
        if basic.official_name.is_none() || basic.description.is_none() {
            priority_gaps.push(IntelCategory::BasicInfo);
        }
        if entity.intel.persons.is_empty() {
            priority_gaps.push(IntelCategory::Persons);
        }
        if entity.intel.locations.is_empty() {
            priority_gaps.push(IntelCategory::Locations);
        }

        GapAnalysis {
            entity_id: entity_id.to_string(),
            has_data: entity.has_data(),
            completeness,
            missing_fields,
            priority_gaps,
        }
    }

    /// Turn a gap report into search queries, priority gaps first.
    /// Never returns an empty list; the bare entity name is the floor.
    pub fn generate_targeted_queries(
        &self,
        profile: &EntityProfile,
        gaps: &GapAnalysis,
    ) -> Vec<String> {
        let mut queries = Vec::new();
        let mut covered = HashSet::new();
        for category in gaps.priority_gaps.iter().chain(&gaps.missing_fields) {
            if !covered.insert(*category) {
                continue;
            }
            for q in gap_queries(profile, *category) {
                queries.push(q);
            }
        }
        dedup_capped(queries, &profile.name)
    }

    /// Broad first-contact queries keyed to the entity type.
    pub fn discovery_queries(&self, profile: &EntityProfile) -> Vec<String> {
        let name = profile.name.trim();
        let mut queries = vec![name.to_string()];
        match profile.entity_type {
            EntityType::Company => {
                queries.push(format!("{name} official website"));
                queries.push(format!("{name} company profile"));
                queries.push(format!("{name} leadership team"));
                queries.push(format!("{name} news"));
            }
            EntityType::Person => {
                queries.push(format!("{name} official website"));
                queries.push(format!("{name} biography"));
                queries.push(format!("{name} interview"));
            }
            EntityType::News => {
                queries.push(format!("{name} coverage"));
                queries.push(format!("{name} latest developments"));
            }
            EntityType::Topic => {
                queries.push(format!("{name} overview"));
                queries.push(format!("{name} explained"));
                queries.push(format!("what is {name}"));
            }
        }
        if let Some(location) = &profile.location {
            queries.push(format!("{name} {location}"));
        }
        dedup_capped(queries, &profile.name)
    }

    /// Build the full plan for one session. TARGETING without an entity
    /// id degrades to DISCOVERY; that is a documented fallback, not an
    /// error.
    pub async fn plan(
        &self,
        profile: &EntityProfile,
        mode: CrawlMode,
        entity_id: Option<&str>,
        learner: &CrawlLearner,
    ) -> CrawlPlan {
        let effective = match (mode, entity_id) {
            (CrawlMode::Targeting, None) => {
                info!("targeting requested without an entity id, running discovery instead");
                CrawlMode::Discovery
            }
            (mode, _) => mode,
        };

        let mut gaps = None;
        let queries = match (effective, entity_id) {
            (CrawlMode::Targeting, Some(id)) => {
                let analysis = self.analyze_entity_gaps(id).await;
                let queries = self.generate_targeted_queries(profile, &analysis);
                gaps = Some(analysis);
                queries
            }
            _ => self.discovery_queries(profile),
        };

        let mut seeds: Vec<String> = profile
            .official_domains
            .iter()
            .map(|d| format!("https://{d}"))
            .collect();
        if effective == CrawlMode::Expansion {
            for (domain, _) in learner
                .successful_domains(profile.entity_type)
                .into_iter()
                .take(EXPANSION_DOMAIN_CAP)
            {
                let url = format!("https://{domain}");
                if !seeds.contains(&url) {
                    seeds.push(url);
                }
            }
        }
        for query in &queries {
            match self.search.search(query, self.results_per_query).await {
                Ok(urls) => {
                    for url in urls {
                        if !seeds.contains(&url) {
                            seeds.push(url);
                        }
                    }
                }
                Err(e) => warn!("search failed for '{query}': {e}"),
            }
        }

        CrawlPlan {
            mode: effective,
            queries,
            seeds,
            gaps,
        }
    }

    /// Plan and run a crawl in one call.
    pub async fn crawl_for_entity(
        &self,
        explorer: &mut Explorer,
        mode: CrawlMode,
        entity_id: Option<&str>,
    ) -> HashMap<String, PageRecord> {
        let plan = self
            .plan(explorer.profile(), mode, entity_id, explorer.learner())
            .await;
        info!(
            "planned {} crawl: {} queries, {} seeds",
            plan.mode,
            plan.queries.len(),
            plan.seeds.len()
        );
        explorer.explore(&plan.seeds).await
    }
}

/// Search queries that chase one missing category.
fn gap_queries(profile: &EntityProfile, category: IntelCategory) -> Vec<String> {
    let name = profile.name.trim();
    let location = profile.location.as_deref();
    match category {
        IntelCategory::BasicInfo => vec![
            format!("{name} official website"),
            format!("{name} about"),
        ],
        IntelCategory::Persons => vec![format!("{name} leadership founders executives")],
        IntelCategory::Jobs => vec![format!("{name} careers jobs")],
        IntelCategory::Metrics => vec![format!("{name} number of employees size")],
        IntelCategory::Locations => match location {
            Some(loc) => vec![format!("{name} headquarters {loc}")],
            None => vec![format!("{name} headquarters location")],
        },
        IntelCategory::Financials => vec![format!("{name} revenue funding")],
        IntelCategory::Products => vec![format!("{name} products services")],
        IntelCategory::Events => vec![format!("{name} announcements news")],
        IntelCategory::Relationships => {
            vec![format!("{name} parent company subsidiaries partners")]
        }
    }
}

/// Order-preserving dedup with the query cap; an empty result falls back
/// to the bare entity name.
fn dedup_capped(queries: Vec<String>, name: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
        .collect();
    out.truncate(QUERY_CAP);
    if out.is_empty() {
        out.push(name.trim().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;
    use crate::entity::{Finding, PageIntel};
    use crate::storage::MemoryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;

    /// Deterministic fake engine: one result URL per query, derived from
    /// the query text.
    struct StubSearch;

    #[async_trait]
    impl SearchProvider for StubSearch {
        async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<String>> {
            let slug = query.to_lowercase().replace(' ', "-");
            Ok(vec![format!("https://results.example/{slug}")]
                .into_iter()
                .take(limit)
                .collect())
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl SearchProvider for FailingSearch {
        async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<String>> {
            Err(anyhow!("engine unreachable"))
        }
    }

    fn planner() -> (CrawlPlanner, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CrawlPlanner::new(store.clone(), Arc::new(StubSearch), 5), store)
    }

    fn profile() -> EntityProfile {
        EntityProfile::new("Acme Robotics", EntityType::Company)
    }

    #[tokio::test]
    async fn test_gap_analysis_unknown_entity() {
        let (planner, _store) = planner();
        let gaps = planner.analyze_entity_gaps("nobody").await;

        assert!(!gaps.has_data);
        assert_eq!(gaps.completeness, 0.0);
        assert_eq!(gaps.missing_fields.len(), IntelCategory::ALL.len());
        assert!(gaps.priority_gaps.contains(&IntelCategory::BasicInfo));
        assert!(gaps.priority_gaps.contains(&IntelCategory::Persons));
        assert!(gaps.priority_gaps.contains(&IntelCategory::Locations));
    }

    #[tokio::test]
    async fn test_gap_analysis_counts_filled_categories() {
        let (planner, store) = planner();
        let mut page = PageIntel::default();
        page.basic_info.official_name = Some("Acme Robotics Inc".to_string());
        page.add(
            IntelCategory::Persons,
            Finding::new("person: Jane Doe (CEO)", "https://acme.com/team", 70.0),
        );
        store
            .save_intelligence("acme", "https://acme.com/team", &page)
            .await
            .unwrap();

        let gaps = planner.analyze_entity_gaps("acme").await;
        assert!(gaps.has_data);
        // Persons is filled; basic info is not complete without a description
        assert_eq!(gaps.completeness, 1.0 / 9.0);
        assert!(gaps.missing_fields.contains(&IntelCategory::BasicInfo));
        assert!(!gaps.missing_fields.contains(&IntelCategory::Persons));
        assert!(gaps.priority_gaps.contains(&IntelCategory::BasicInfo));
        assert!(!gaps.priority_gaps.contains(&IntelCategory::Persons));
        assert!(gaps.priority_gaps.contains(&IntelCategory::Locations));
    }

    #[tokio::test]
    async fn test_targeted_queries_ordered_and_capped() {
        let (planner, _store) = planner();
        let gaps = planner.analyze_entity_gaps("nobody").await;
        let queries = planner.generate_targeted_queries(&profile(), &gaps);

        assert!(!queries.is_empty());
        assert!(queries.len() <= 10);
        // Priority gaps come first: basic info before the long tail
        assert!(queries[0].contains("Acme Robotics"));
        assert!(queries[0].contains("official website"));
        let unique: HashSet<&String> = queries.iter().collect();
        assert_eq!(unique.len(), queries.len());
    }

    #[test]
    fn test_queries_never_empty() {
        let (planner, _store) = planner();
        let gaps = GapAnalysis {
            entity_id: "acme".to_string(),
            has_data: true,
            completeness: 1.0,
            missing_fields: Vec::new(),
            priority_gaps: Vec::new(),
        };
        let queries = planner.generate_targeted_queries(&profile(), &gaps);
        assert_eq!(queries, vec!["Acme Robotics".to_string()]);
    }

    #[tokio::test]
    async fn test_plan_resolves_queries_to_result_seeds() {
        let (planner, _store) = planner();
        let learner = CrawlLearner::new(LearningConfig::default());

        let plan = planner
            .plan(&profile(), CrawlMode::Discovery, None, &learner)
            .await;

        assert_eq!(plan.mode, CrawlMode::Discovery);
        assert_eq!(plan.seeds.len(), plan.queries.len());
        assert!(plan
            .seeds
            .contains(&"https://results.example/acme-robotics".to_string()));
    }

    #[tokio::test]
    async fn test_plan_survives_search_failure() {
        let store = Arc::new(MemoryStore::new());
        let planner = CrawlPlanner::new(store, Arc::new(FailingSearch), 5);
        let learner = CrawlLearner::new(LearningConfig::default());
        let profile = profile().with_official_domains(vec!["acmerobotics.com".into()]);

        let plan = planner
            .plan(&profile, CrawlMode::Discovery, None, &learner)
            .await;

        assert!(!plan.queries.is_empty());
        assert_eq!(plan.seeds, vec!["https://acmerobotics.com".to_string()]);
    }

    #[tokio::test]
    async fn test_targeting_without_id_is_discovery() {
        let (planner, _store) = planner();
        let learner = CrawlLearner::new(LearningConfig::default());

        let targeting = planner
            .plan(&profile(), CrawlMode::Targeting, None, &learner)
            .await;
        let discovery = planner
            .plan(&profile(), CrawlMode::Discovery, None, &learner)
            .await;

        assert_eq!(targeting, discovery);
        assert_eq!(targeting.mode, CrawlMode::Discovery);
    }

    #[tokio::test]
    async fn test_expansion_reseeds_known_domains() {
        let (planner, _store) = planner();
        let mut learner = CrawlLearner::new(LearningConfig::default());
        for _ in 0..3 {
            learner.record_crawl_result(
                "https://gooddomain.example/page",
                crate::entity::PageType::Official,
                0.8,
                true,
                EntityType::Company,
                serde_json::Value::Null,
            );
        }

        let plan = planner
            .plan(&profile(), CrawlMode::Expansion, None, &learner)
            .await;
        assert!(plan
            .seeds
            .contains(&"https://gooddomain.example".to_string()));
    }

    #[tokio::test]
    async fn test_official_domains_seed_first() {
        let (planner, _store) = planner();
        let learner = CrawlLearner::new(LearningConfig::default());
        let profile = profile().with_official_domains(vec!["acmerobotics.com".into()]);

        let plan = planner
            .plan(&profile, CrawlMode::Discovery, None, &learner)
            .await;
        assert_eq!(plan.seeds[0], "https://acmerobotics.com");
        assert!(plan.seeds.len() > plan.queries.len());
    }
}
