//! Intelligence extraction: the collaborator boundary that turns page
//! text into structured findings, plus a regex-driven default so the
//! crawler works without any model behind it.

use crate::acquisition::{ExtractedLink, PageMetadata};
use crate::entity::{BasicInfo, EntityIntel, EntityProfile, Finding, IntelCategory, PageIntel, PageType};
use crate::learning::PageStrategy;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

/// What the extraction collaborator reported for one page.
#[derive(Debug, Clone)]
pub enum ExtractionResult {
    Success(PageIntel),
    Timeout,
    ParseError { message: String },
}

/// Outcome of reflecting on a single finding.
#[derive(Debug, Clone, Copy)]
pub struct Verification {
    pub verified: bool,
    /// Revised confidence on the 0-100 scale.
    pub confidence: f32,
}

/// A link re-scored by the extraction collaborator.
#[derive(Debug, Clone)]
pub struct RankedLink {
    pub url: String,
    pub text: String,
    pub score: f32,
}

/// Capability contract for fact extraction and link ranking.
#[async_trait]
pub trait IntelExtractor: Send + Sync {
    async fn extract(
        &self,
        profile: &EntityProfile,
        text: &str,
        metadata: &PageMetadata,
        page_type: PageType,
        url: &str,
        existing: &EntityIntel,
        strategy: &PageStrategy,
    ) -> ExtractionResult;

    async fn verify(&self, profile: &EntityProfile, finding: &Finding) -> Verification;

    async fn rank_links(
        &self,
        profile: &EntityProfile,
        page_url: &str,
        page_text: &str,
        links: &[ExtractedLink],
    ) -> Vec<RankedLink>;
}

// Capitalization gates on names stay case-sensitive; only the trigger
// verbs and titles match case-insensitively.
static PERSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([A-Z][a-z]+(?: [A-Z][a-z]+){1,2}),?\s+(?:(?i:is |was |the |our |its ))*((?i:CEO|CTO|CFO|COO|chief executive|founder|co-founder|president|chairman|director))\b",
    )
    .unwrap()
});

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:headquartered|based|located)\s+(?i:in)\s+([A-Z][A-Za-z]+(?:,? [A-Z][A-Za-z]+){0,3})")
        .unwrap()
});

static FOUNDED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfounded\s+in\s+(\d{4})\b").unwrap());

static MONEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:raised|revenue of|valued at|funding of)\s+(\$[\d.,]+\s?(?:million|billion|[mb]n?)\b)")
        .unwrap()
});

static METRIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([\d,]+\+?)\s+(employees|customers|users|clients|offices|countries)\b")
        .unwrap()
});

static EVENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:announced|acquired|merged with|launched|partnered with)\s+([A-Z][\w-]+(?: [A-Z][\w-]+){0,3})")
        .unwrap()
});

static RELATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:subsidiary of|parent company(?: is)?|acquired by|joint venture with)\s+([A-Z][\w-]+(?: [A-Z][\w-]+){0,3})")
        .unwrap()
});

/// How many matches of one kind a single page may contribute.
const MAX_FINDINGS_PER_CATEGORY: usize = 8;

/// Default extractor: entity-gated regex heuristics over page text.
#[derive(Debug, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    fn base_confidence(page_type: PageType) -> f32 {
        match page_type {
            PageType::Official => 65.0,
            PageType::Registry => 60.0,
            PageType::News => 55.0,
            PageType::Social => 45.0,
            PageType::General => 40.0,
        }
    }

    fn capture_findings(
        intel: &mut PageIntel,
        category: IntelCategory,
        re: &Regex,
        text: &str,
        url: &str,
        confidence: f32,
        label: &str,
    ) {
        for caps in re.captures_iter(text).take(MAX_FINDINGS_PER_CATEGORY) {
            let Some(value) = caps.get(1) else { continue };
            let statement = match caps.get(2) {
                Some(extra) => format!("{label}: {} ({})", value.as_str().trim(), extra.as_str()),
                None => format!("{label}: {}", value.as_str().trim()),
            };
            let exists = intel
                .findings(category)
                .iter()
                .any(|f| f.statement == statement);
            if !exists {
                intel.add(
                    category,
                    Finding::new(statement, url, confidence).with_detail(value.as_str().trim()),
                );
            }
        }
    }
}

#[async_trait]
impl IntelExtractor for HeuristicExtractor {
    async fn extract(
        &self,
        profile: &EntityProfile,
        text: &str,
        metadata: &PageMetadata,
        page_type: PageType,
        url: &str,
        existing: &EntityIntel,
        strategy: &PageStrategy,
    ) -> ExtractionResult {
        // Work on at most one chunk of text
        let mut chunk = text;
        if chunk.len() > strategy.chunk_size {
            let mut cut = strategy.chunk_size;
            while cut > 0 && !chunk.is_char_boundary(cut) {
                cut -= 1;
            }
            chunk = &chunk[..cut];
        }

        // Relevance gate: a page that never mentions the entity tells us
        // nothing about it
        let chunk_lower = chunk.to_lowercase();
        let name_words = profile.name_words();
        let mentions_entity = name_words.iter().any(|w| chunk_lower.contains(w.as_str()))
            || metadata
                .title
                .as_deref()
                .map(|t| {
                    let t = t.to_lowercase();
                    name_words.iter().any(|w| t.contains(w.as_str()))
                })
                .unwrap_or(false);
        if !mentions_entity {
            return ExtractionResult::Success(PageIntel::default());
        }

        let mut intel = PageIntel::default();
        let confidence = Self::base_confidence(page_type);

        if !existing.intel.basic_info.is_complete()
            && matches!(page_type, PageType::Official | PageType::Registry)
        {
            let mut basic = BasicInfo::default();
            basic.official_name = metadata.site_name.clone().or_else(|| {
                metadata
                    .title
                    .as_deref()
                    .map(|t| t.split(['|', '-']).next().unwrap_or(t).trim().to_string())
            });
            basic.description = metadata.description.clone();
            if page_type == PageType::Official {
                basic.website = Some(crate::web::normalize_url(url));
            }
            if let Some(caps) = FOUNDED_RE.captures(chunk) {
                basic.founded = caps.get(1).map(|m| m.as_str().to_string());
            }
            intel.basic_info = basic;
        }

        Self::capture_findings(
            &mut intel,
            IntelCategory::Persons,
            &PERSON_RE,
            chunk,
            url,
            confidence,
            "person",
        );
        Self::capture_findings(
            &mut intel,
            IntelCategory::Locations,
            &LOCATION_RE,
            chunk,
            url,
            confidence,
            "location",
        );
        Self::capture_findings(
            &mut intel,
            IntelCategory::Financials,
            &MONEY_RE,
            chunk,
            url,
            confidence,
            "financial",
        );
        Self::capture_findings(
            &mut intel,
            IntelCategory::Metrics,
            &METRIC_RE,
            chunk,
            url,
            confidence,
            "metric",
        );
        Self::capture_findings(
            &mut intel,
            IntelCategory::Events,
            &EVENT_RE,
            chunk,
            url,
            confidence,
            "event",
        );
        Self::capture_findings(
            &mut intel,
            IntelCategory::Relationships,
            &RELATION_RE,
            chunk,
            url,
            confidence,
            "relationship",
        );

        ExtractionResult::Success(intel)
    }

    /// Deterministic reflection: findings that name the entity and carry
    /// decent extraction confidence get verified with a small bump.
    async fn verify(&self, profile: &EntityProfile, finding: &Finding) -> Verification {
        let statement = finding.statement.to_lowercase();
        let names_entity = profile
            .name_words()
            .iter()
            .any(|w| statement.contains(w.as_str()));
        let bump = if names_entity { 15.0 } else { 5.0 };
        let confidence = (finding.confidence + bump).min(100.0);
        Verification {
            verified: confidence >= 70.0,
            confidence,
        }
    }

    async fn rank_links(
        &self,
        profile: &EntityProfile,
        _page_url: &str,
        _page_text: &str,
        links: &[ExtractedLink],
    ) -> Vec<RankedLink> {
        let name_words = profile.name_words();
        let keywords = profile.entity_type.url_keywords();
        links
            .iter()
            .map(|link| {
                let haystack = format!("{} {}", link.url, link.text).to_lowercase();
                let mut score: f32 = 30.0;
                for w in &name_words {
                    if haystack.contains(w.as_str()) {
                        score += 25.0;
                    }
                }
                for kw in keywords {
                    if haystack.contains(kw) {
                        score += 10.0;
                    }
                }
                RankedLink {
                    url: link.url.clone(),
                    text: link.text.clone(),
                    score: score.min(100.0),
                }
            })
            .collect()
    }
}
