//! HTML content analysis: text extraction, metadata, outgoing links, and
//! page-type detection from layered signals (schema.org, then domain,
//! then URL path, then Open Graph).

use crate::entity::{EntityType, PageType};
use crate::web;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style>").unwrap());
static NOSCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<noscript\b.*?</noscript>").unwrap());

static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static META_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").unwrap());
static LD_JSON_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

const SOCIAL_DOMAINS: &[&str] = &[
    "linkedin.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "youtube.com",
    "tiktok.com",
    "github.com",
];

const REGISTRY_DOMAINS: &[&str] = &[
    "sec.gov",
    "opencorporates.com",
    "companieshouse.gov.uk",
    "crunchbase.com",
    "dnb.com",
    "northdata.de",
];

const NEWS_DOMAINS: &[&str] = &[
    "reuters.com",
    "bloomberg.com",
    "apnews.com",
    "bbc.com",
    "cnn.com",
    "theguardian.com",
    "nytimes.com",
    "wsj.com",
    "ft.com",
    "techcrunch.com",
];

/// Page-level metadata pulled from head tags and JSON-LD.
#[derive(Debug, Clone, Default)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
    pub og_type: Option<String>,
    /// Lowercased schema.org `@type` values found in JSON-LD blocks.
    pub schema_types: Vec<String>,
}

/// An outgoing link with its anchor text, already absolutized.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedLink {
    pub url: String,
    pub text: String,
}

/// Capability contract for turning raw HTML into crawl signals.
pub trait ContentAnalyzer: Send + Sync {
    fn html_to_text(&self, html: &str) -> String;
    fn extract_metadata(&self, html: &str) -> PageMetadata;
    fn extract_links(&self, base_url: &str, html: &str) -> Vec<ExtractedLink>;
    fn detect_page_type(
        &self,
        url: &str,
        metadata: &PageMetadata,
        entity_type: EntityType,
    ) -> PageType;
}

/// Default analyzer built on DOM parsing and keyword heuristics.
#[derive(Debug, Default)]
pub struct HeuristicAnalyzer;

impl ContentAnalyzer for HeuristicAnalyzer {
    fn html_to_text(&self, html: &str) -> String {
        let cleaned = SCRIPT_RE.replace_all(html, " ");
        let cleaned = STYLE_RE.replace_all(&cleaned, " ");
        let cleaned = NOSCRIPT_RE.replace_all(&cleaned, " ");

        let doc = Html::parse_document(&cleaned);
        let raw: String = match doc.select(&BODY_SEL).next() {
            Some(body) => body.text().collect::<Vec<_>>().join(" "),
            None => doc.root_element().text().collect::<Vec<_>>().join(" "),
        };
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn extract_metadata(&self, html: &str) -> PageMetadata {
        let doc = Html::parse_document(html);
        let mut meta = PageMetadata::default();

        if let Some(title) = doc.select(&TITLE_SEL).next() {
            let text = title.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                meta.title = Some(text);
            }
        }

        for el in doc.select(&META_SEL) {
            let key = el
                .value()
                .attr("name")
                .or_else(|| el.value().attr("property"))
                .unwrap_or("")
                .to_lowercase();
            let Some(content) = el.value().attr("content") else {
                continue;
            };
            let content = content.trim();
            if content.is_empty() {
                continue;
            }
            match key.as_str() {
                "description" => meta.description = Some(content.to_string()),
                "og:description" => {
                    if meta.description.is_none() {
                        meta.description = Some(content.to_string());
                    }
                }
                "og:site_name" => meta.site_name = Some(content.to_string()),
                "og:type" => meta.og_type = Some(content.to_lowercase()),
                "og:title" => {
                    if meta.title.is_none() {
                        meta.title = Some(content.to_string());
                    }
                }
                _ => {}
            }
        }

        for block in doc.select(&LD_JSON_SEL) {
            let raw = block.text().collect::<String>();
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                collect_schema_types(&value, &mut meta.schema_types);
            }
        }

        meta
    }

    fn extract_links(&self, base_url: &str, html: &str) -> Vec<ExtractedLink> {
        let doc = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for el in doc.select(&ANCHOR_SEL) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let Some(url) = web::absolutize(base_url, href) else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }
            let text = el
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            links.push(ExtractedLink { url, text });
        }

        links
    }

    fn detect_page_type(
        &self,
        url: &str,
        metadata: &PageMetadata,
        entity_type: EntityType,
    ) -> PageType {
        // 1. schema.org types are the strongest signal
        if let Some(pt) = classify_from_schema(&metadata.schema_types) {
            return pt;
        }

        // 2. Known domains
        let domain = web::domain_of(url);
        if let Some(pt) = classify_from_domain(&domain) {
            return pt;
        }

        // 3. URL path hints
        let url_lower = url.to_lowercase();
        if let Some(pt) = classify_from_path(&url_lower, entity_type) {
            return pt;
        }

        // 4. Open Graph type
        match metadata.og_type.as_deref() {
            Some("article") => return PageType::News,
            Some("profile") => return PageType::Social,
            Some(og) if og.starts_with("business") => return PageType::Official,
            _ => {}
        }

        PageType::General
    }
}

fn classify_from_schema(types: &[String]) -> Option<PageType> {
    for t in types {
        let pt = match t.as_str() {
            "newsarticle" | "reportagenewsarticle" | "blogposting" | "article" => PageType::News,
            "organization" | "corporation" | "localbusiness" | "aboutpage" => PageType::Official,
            "person" | "profilepage" => PageType::Social,
            "governmentorganization" | "governmentoffice" => PageType::Registry,
            _ => continue,
        };
        return Some(pt);
    }
    None
}

fn classify_from_domain(domain: &str) -> Option<PageType> {
    let matches_any = |list: &[&str]| {
        list.iter()
            .any(|d| domain == *d || domain.ends_with(&format!(".{d}")))
    };
    if matches_any(SOCIAL_DOMAINS) {
        return Some(PageType::Social);
    }
    if matches_any(REGISTRY_DOMAINS) {
        return Some(PageType::Registry);
    }
    if matches_any(NEWS_DOMAINS) || domain.starts_with("news.") {
        return Some(PageType::News);
    }
    None
}

fn classify_from_path(url_lower: &str, entity_type: EntityType) -> Option<PageType> {
    const NEWS_HINTS: &[&str] = &["/news/", "/press/", "/article/", "/articles/", "/blog/"];
    const OFFICIAL_HINTS: &[&str] = &["/about", "/company", "/team", "/leadership", "/contact"];
    const SOCIAL_HINTS: &[&str] = &["/profile/", "/people/", "/author/"];
    const REGISTRY_HINTS: &[&str] = &["/filings/", "/registry/", "/register/"];

    if NEWS_HINTS.iter().any(|h| url_lower.contains(h)) {
        return Some(PageType::News);
    }
    if OFFICIAL_HINTS.iter().any(|h| url_lower.contains(h)) {
        return Some(PageType::Official);
    }
    if SOCIAL_HINTS.iter().any(|h| url_lower.contains(h)) {
        return Some(PageType::Social);
    }
    if REGISTRY_HINTS.iter().any(|h| url_lower.contains(h)) {
        return Some(PageType::Registry);
    }
    // LinkedIn-style member paths for person subjects
    if entity_type == EntityType::Person && url_lower.contains("/in/") {
        return Some(PageType::Social);
    }
    None
}

/// Collect lowercase `@type` values from a JSON-LD document, including
/// `@graph` members and type arrays.
fn collect_schema_types(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(t) = map.get("@type") {
                match t {
                    serde_json::Value::String(s) => out.push(s.to_lowercase()),
                    serde_json::Value::Array(arr) => {
                        out.extend(arr.iter().filter_map(|v| v.as_str()).map(str::to_lowercase));
                    }
                    _ => {}
                }
            }
            if let Some(graph) = map.get("@graph") {
                collect_schema_types(graph, out);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr {
                collect_schema_types(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<html>
<head>
  <title>Acme Robotics - About</title>
  <meta name="description" content="Acme Robotics builds industrial robots.">
  <meta property="og:site_name" content="Acme Robotics">
  <meta property="og:type" content="website">
  <script type="application/ld+json">{"@context":"https://schema.org","@type":"Organization","name":"Acme Robotics"}</script>
  <style>body { color: red; }</style>
</head>
<body>
  <script>console.log("tracking")</script>
  <h1>About   Acme</h1>
  <p>We build robots.</p>
  <a href="/team">Our Team</a>
  <a href="https://acme.com/careers">Careers</a>
  <a href="mailto:info@acme.com">Email us</a>
  <a href="/team">Our Team again</a>
</body>
</html>"#;

    #[test]
    fn test_html_to_text_strips_script_and_style() {
        let analyzer = HeuristicAnalyzer;
        let text = analyzer.html_to_text(SAMPLE);
        assert!(text.contains("About Acme"));
        assert!(text.contains("We build robots."));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn test_extract_metadata() {
        let analyzer = HeuristicAnalyzer;
        let meta = analyzer.extract_metadata(SAMPLE);
        assert_eq!(meta.title.as_deref(), Some("Acme Robotics - About"));
        assert_eq!(
            meta.description.as_deref(),
            Some("Acme Robotics builds industrial robots.")
        );
        assert_eq!(meta.site_name.as_deref(), Some("Acme Robotics"));
        assert_eq!(meta.og_type.as_deref(), Some("website"));
        assert_eq!(meta.schema_types, vec!["organization"]);
    }

    #[test]
    fn test_extract_links_absolutizes_and_dedups() {
        let analyzer = HeuristicAnalyzer;
        let links = analyzer.extract_links("https://acme.com/about", SAMPLE);
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://acme.com/team", "https://acme.com/careers"]
        );
        assert_eq!(links[0].text, "Our Team");
    }

    #[test]
    fn test_schema_types_from_graph_and_arrays() {
        let mut out = Vec::new();
        let value = serde_json::json!({
            "@graph": [
                {"@type": "WebSite"},
                {"@type": ["NewsArticle", "Article"]}
            ]
        });
        collect_schema_types(&value, &mut out);
        assert_eq!(out, vec!["website", "newsarticle", "article"]);
    }

    #[test]
    fn test_detect_page_type_prefers_schema() {
        let analyzer = HeuristicAnalyzer;
        let meta = PageMetadata {
            schema_types: vec!["newsarticle".to_string()],
            ..PageMetadata::default()
        };
        // Even on an official-looking path, schema wins
        let pt = analyzer.detect_page_type("https://acme.com/about", &meta, EntityType::Company);
        assert_eq!(pt, PageType::News);
    }

    #[test]
    fn test_detect_page_type_by_domain() {
        let analyzer = HeuristicAnalyzer;
        let meta = PageMetadata::default();
        assert_eq!(
            analyzer.detect_page_type(
                "https://www.linkedin.com/company/acme",
                &meta,
                EntityType::Company
            ),
            PageType::Social
        );
        assert_eq!(
            analyzer.detect_page_type(
                "https://www.sec.gov/cgi-bin/browse-edgar?company=acme",
                &meta,
                EntityType::Company
            ),
            PageType::Registry
        );
    }

    #[test]
    fn test_detect_page_type_by_path_and_fallback() {
        let analyzer = HeuristicAnalyzer;
        let meta = PageMetadata::default();
        assert_eq!(
            analyzer.detect_page_type("https://acme.com/about", &meta, EntityType::Company),
            PageType::Official
        );
        assert_eq!(
            analyzer.detect_page_type("https://acme.com/x9y", &meta, EntityType::Company),
            PageType::General
        );
    }

    #[test]
    fn test_detect_page_type_og_fallback() {
        let analyzer = HeuristicAnalyzer;
        let meta = PageMetadata {
            og_type: Some("article".to_string()),
            ..PageMetadata::default()
        };
        assert_eq!(
            analyzer.detect_page_type("https://blog.example/post-1", &meta, EntityType::Company),
            PageType::News
        );
    }
}
