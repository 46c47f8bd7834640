//! Entity profiles: the subject of a crawl and the text features derived
//! from it that drive URL scoring.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Corporate suffixes stripped from entity names before word matching.
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc", "inc.", "llc", "llc.", "ltd", "ltd.", "corp", "corp.", "corporation", "company", "co",
    "co.", "gmbh", "plc", "sa", "s.a.", "ag", "group", "holdings",
];

/// What kind of subject the crawl is investigating.
///
/// The type selects keyword vocabularies during scoring and the category
/// emphasis the planner applies in targeting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Company,
    Person,
    News,
    Topic,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Company => "company",
            EntityType::Person => "person",
            EntityType::News => "news",
            EntityType::Topic => "topic",
        }
    }

    /// Keywords that mark a URL as relevant to entities of this type.
    pub fn url_keywords(&self) -> &'static [&'static str] {
        match self {
            EntityType::Company => &[
                "about", "company", "corporate", "team", "leadership", "investor", "careers",
                "products", "services", "press",
            ],
            EntityType::Person => &[
                "profile", "bio", "biography", "people", "author", "speaker", "linkedin",
                "interview",
            ],
            EntityType::News => &[
                "news", "article", "story", "breaking", "report", "coverage", "press",
            ],
            EntityType::Topic => &[
                "guide", "overview", "research", "analysis", "explained", "wiki", "report",
            ],
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about the crawl subject up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityProfile {
    pub name: String,
    pub entity_type: EntityType,
    /// Optional geographic hint, used in search seed queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Domains known a priori to be operated by the entity.
    #[serde(default)]
    pub official_domains: Vec<String>,
    /// Alternate names and abbreviations the entity goes by.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl EntityProfile {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            location: None,
            official_domains: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_official_domains(mut self, domains: Vec<String>) -> Self {
        self.official_domains = domains;
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Entity name lowercased with corporate suffixes dropped.
    pub fn normalized_name(&self) -> String {
        self.name
            .to_lowercase()
            .split_whitespace()
            .filter(|w| !CORPORATE_SUFFIXES.contains(w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Distinctive name words: longer than 3 chars, suffixes stripped.
    ///
    /// Short words like "the" or "co" match too much of the web to be
    /// useful scoring signals.
    pub fn name_words(&self) -> Vec<String> {
        self.normalized_name()
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .map(str::to_string)
            .collect()
    }

    /// Candidate official-site domain label, e.g. `acmerobotics` for
    /// "Acme Robotics Inc".
    pub fn compact_name(&self) -> String {
        self.normalized_name()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect()
    }

    /// Topic keywords drawn from the name and aliases.
    ///
    /// Split on whitespace, lowercased, deduplicated, words of length
    /// 2 or less dropped.
    pub fn topic_keywords(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for source in std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str)) {
            for word in source.to_lowercase().split_whitespace() {
                let word = word.trim_matches(|c: char| !c.is_alphanumeric());
                if word.len() > 2 && !seen.iter().any(|s| s == word) {
                    seen.push(word.to_string());
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_name_strips_suffixes() {
        let profile = EntityProfile::new("Acme Robotics Inc", EntityType::Company);
        assert_eq!(profile.normalized_name(), "acme robotics");
        assert_eq!(profile.compact_name(), "acmerobotics");
    }

    #[test]
    fn test_name_words_drop_short_words() {
        let profile = EntityProfile::new("The Acme Co", EntityType::Company);
        assert_eq!(profile.name_words(), vec!["acme".to_string()]);
    }

    #[test]
    fn test_topic_keywords_dedup_and_min_length() {
        let profile = EntityProfile::new("Quantum Computing", EntityType::Topic)
            .with_aliases(vec!["quantum supremacy".into(), "QC".into()]);
        let kw = profile.topic_keywords();
        assert_eq!(kw, vec!["quantum", "computing", "supremacy"]);
    }

    #[test]
    fn test_entity_type_roundtrip() {
        let json = serde_json::to_string(&EntityType::Company).unwrap();
        assert_eq!(json, "\"company\"");
        let back: EntityType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EntityType::Company);
    }
}
