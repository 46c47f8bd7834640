//! Structured intelligence records: the fixed category set every page's
//! extraction folds into, and the per-page findings that feed it.

use serde::{Deserialize, Serialize};

/// Coarse classification of a fetched page's purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Official,
    News,
    Registry,
    Social,
    General,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Official => "official",
            PageType::News => "news",
            PageType::Registry => "registry",
            PageType::Social => "social",
            PageType::General => "general",
        }
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed intelligence category set. Gap analysis and the extraction
/// boundary both speak in exactly these nine categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntelCategory {
    BasicInfo,
    Persons,
    Jobs,
    Metrics,
    Locations,
    Financials,
    Products,
    Events,
    Relationships,
}

impl IntelCategory {
    pub const ALL: [IntelCategory; 9] = [
        IntelCategory::BasicInfo,
        IntelCategory::Persons,
        IntelCategory::Jobs,
        IntelCategory::Metrics,
        IntelCategory::Locations,
        IntelCategory::Financials,
        IntelCategory::Products,
        IntelCategory::Events,
        IntelCategory::Relationships,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntelCategory::BasicInfo => "basic_info",
            IntelCategory::Persons => "persons",
            IntelCategory::Jobs => "jobs",
            IntelCategory::Metrics => "metrics",
            IntelCategory::Locations => "locations",
            IntelCategory::Financials => "financials",
            IntelCategory::Products => "products",
            IntelCategory::Events => "events",
            IntelCategory::Relationships => "relationships",
        }
    }
}

impl std::fmt::Display for IntelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single extracted fact with provenance and verification status.
///
/// `confidence` is on a 0-100 scale as returned by the verification
/// collaborator; findings at 70 or above count as high-confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub source_url: String,
    pub confidence: f32,
    #[serde(default)]
    pub verified: bool,
}

impl Finding {
    pub fn new(statement: impl Into<String>, source_url: impl Into<String>, confidence: f32) -> Self {
        Self {
            statement: statement.into(),
            detail: None,
            source_url: source_url.into(),
            confidence,
            verified: false,
        }
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// Attach the raw captured value behind the statement.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_high_confidence(&self) -> bool {
        self.verified && self.confidence >= 70.0
    }
}

/// Foundational facts about the entity itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl BasicInfo {
    /// Complete enough to stop prioritizing basic-info pages: both the
    /// official name and a description are known.
    pub fn is_complete(&self) -> bool {
        self.official_name.is_some() && self.description.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.official_name.is_none()
            && self.description.is_none()
            && self.industry.is_none()
            && self.founded.is_none()
            && self.website.is_none()
    }

    /// Take any field the other record has that this one lacks.
    pub fn absorb(&mut self, other: &BasicInfo) {
        if self.official_name.is_none() {
            self.official_name = other.official_name.clone();
        }
        if self.description.is_none() {
            self.description = other.description.clone();
        }
        if self.industry.is_none() {
            self.industry = other.industry.clone();
        }
        if self.founded.is_none() {
            self.founded = other.founded.clone();
        }
        if self.website.is_none() {
            self.website = other.website.clone();
        }
    }
}

/// Everything extracted from one page, shaped on the fixed category set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageIntel {
    #[serde(default)]
    pub basic_info: BasicInfo,
    #[serde(default)]
    pub persons: Vec<Finding>,
    #[serde(default)]
    pub jobs: Vec<Finding>,
    #[serde(default)]
    pub metrics: Vec<Finding>,
    #[serde(default)]
    pub locations: Vec<Finding>,
    #[serde(default)]
    pub financials: Vec<Finding>,
    #[serde(default)]
    pub products: Vec<Finding>,
    #[serde(default)]
    pub events: Vec<Finding>,
    #[serde(default)]
    pub relationships: Vec<Finding>,
}

impl PageIntel {
    pub fn findings(&self, category: IntelCategory) -> &[Finding] {
        match category {
            IntelCategory::BasicInfo => &[],
            IntelCategory::Persons => &self.persons,
            IntelCategory::Jobs => &self.jobs,
            IntelCategory::Metrics => &self.metrics,
            IntelCategory::Locations => &self.locations,
            IntelCategory::Financials => &self.financials,
            IntelCategory::Products => &self.products,
            IntelCategory::Events => &self.events,
            IntelCategory::Relationships => &self.relationships,
        }
    }

    pub fn findings_mut(&mut self, category: IntelCategory) -> Option<&mut Vec<Finding>> {
        match category {
            IntelCategory::BasicInfo => None,
            IntelCategory::Persons => Some(&mut self.persons),
            IntelCategory::Jobs => Some(&mut self.jobs),
            IntelCategory::Metrics => Some(&mut self.metrics),
            IntelCategory::Locations => Some(&mut self.locations),
            IntelCategory::Financials => Some(&mut self.financials),
            IntelCategory::Products => Some(&mut self.products),
            IntelCategory::Events => Some(&mut self.events),
            IntelCategory::Relationships => Some(&mut self.relationships),
        }
    }

    pub fn add(&mut self, category: IntelCategory, finding: Finding) {
        if let Some(list) = self.findings_mut(category) {
            list.push(finding);
        }
    }

    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        IntelCategory::ALL
            .iter()
            .flat_map(move |c| self.findings(*c).iter())
    }

    pub fn finding_count(&self) -> usize {
        self.all_findings().count()
    }

    pub fn is_empty(&self) -> bool {
        self.basic_info.is_empty() && self.finding_count() == 0
    }

    /// Any verified finding at confidence 70 or above.
    pub fn has_high_confidence(&self) -> bool {
        self.all_findings().any(Finding::is_high_confidence)
    }

    /// Scalar extraction quality in [0, 1] fed to the learner.
    ///
    /// Blends breadth (finding count, saturating at 5), mean confidence,
    /// and the share of verified findings. An empty extraction is 0.
    pub fn quality(&self) -> f32 {
        let n = self.finding_count();
        if n == 0 {
            return if self.basic_info.is_empty() { 0.0 } else { 0.3 };
        }
        let breadth = (n as f32 / 5.0).min(1.0);
        let mean_conf =
            self.all_findings().map(|f| f.confidence).sum::<f32>() / n as f32 / 100.0;
        let verified_share =
            self.all_findings().filter(|f| f.verified).count() as f32 / n as f32;
        (0.4 * breadth + 0.3 * mean_conf.clamp(0.0, 1.0) + 0.3 * verified_share).clamp(0.0, 1.0)
    }

    /// Which categories this page contributed to.
    pub fn touched_categories(&self) -> Vec<IntelCategory> {
        IntelCategory::ALL
            .iter()
            .copied()
            .filter(|c| match c {
                IntelCategory::BasicInfo => !self.basic_info.is_empty(),
                other => !self.findings(*other).is_empty(),
            })
            .collect()
    }
}

/// Accumulated intelligence for one entity across every page crawled so
/// far, in any session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityIntel {
    pub entity_id: String,
    #[serde(default)]
    pub intel: PageIntel,
    /// Pages that contributed at least one finding.
    #[serde(default)]
    pub source_pages: Vec<String>,
}

impl EntityIntel {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            intel: PageIntel::default(),
            source_pages: Vec::new(),
        }
    }

    /// Fold one page's extraction into the accumulated record.
    pub fn absorb(&mut self, page_url: &str, page: &PageIntel) {
        if page.is_empty() {
            return;
        }
        self.intel.basic_info.absorb(&page.basic_info);
        for category in IntelCategory::ALL {
            if let Some(list) = self.intel.findings_mut(category) {
                list.extend(page.findings(category).iter().cloned());
            }
        }
        if !self.source_pages.iter().any(|u| u == page_url) {
            self.source_pages.push(page_url.to_string());
        }
    }

    /// A category counts as filled when it holds at least one finding;
    /// basic info additionally requires name and description.
    pub fn is_filled(&self, category: IntelCategory) -> bool {
        match category {
            IntelCategory::BasicInfo => self.intel.basic_info.is_complete(),
            other => !self.intel.findings(other).is_empty(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.intel.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_empty_is_zero() {
        assert_eq!(PageIntel::default().quality(), 0.0);
    }

    #[test]
    fn test_quality_bounded() {
        let mut page = PageIntel::default();
        for i in 0..8 {
            page.add(
                IntelCategory::Persons,
                Finding::new(format!("person {i}"), "https://a.com", 95.0).verified(),
            );
        }
        let q = page.quality();
        assert!(q > 0.8 && q <= 1.0, "quality {q} out of expected range");
    }

    #[test]
    fn test_high_confidence_requires_verified() {
        let mut page = PageIntel::default();
        page.add(
            IntelCategory::Persons,
            Finding::new("ceo", "https://a.com", 90.0),
        );
        assert!(!page.has_high_confidence());
        page.add(
            IntelCategory::Persons,
            Finding::new("cfo", "https://a.com", 72.0).verified(),
        );
        assert!(page.has_high_confidence());
    }

    #[test]
    fn test_absorb_fills_missing_basic_fields_only() {
        let mut intel = EntityIntel::new("e1");
        intel.intel.basic_info.official_name = Some("Acme Robotics".into());

        let mut page = PageIntel::default();
        page.basic_info.official_name = Some("ACME".into());
        page.basic_info.description = Some("Builds robots".into());
        intel.absorb("https://acme.com", &page);

        assert_eq!(intel.intel.basic_info.official_name.as_deref(), Some("Acme Robotics"));
        assert_eq!(intel.intel.basic_info.description.as_deref(), Some("Builds robots"));
        assert_eq!(intel.source_pages, vec!["https://acme.com".to_string()]);
    }

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&IntelCategory::BasicInfo).unwrap();
        assert_eq!(json, "\"basic_info\"");
    }
}
