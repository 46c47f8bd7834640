//! Query-to-URL resolution against an HTML search endpoint. Search
//! pages are scaffolding: their organic result links become crawl
//! seeds, the pages themselves are never part of the result set.

use crate::acquisition::content::{ContentAnalyzer, HeuristicAnalyzer};
use crate::acquisition::fetch::{FetchOutcome, PageFetcher};
use crate::web;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Resolves a search query to organic result URLs.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}

/// Scrapes a DuckDuckGo-style HTML results endpoint.
///
/// The endpoint URL comes from configuration with `{query}` standing in
/// for the encoded query, so self-hosted metasearch frontends work too.
pub struct HtmlSearchProvider {
    fetcher: Arc<dyn PageFetcher>,
    url_template: String,
    analyzer: HeuristicAnalyzer,
}

impl HtmlSearchProvider {
    pub fn new(fetcher: Arc<dyn PageFetcher>, url_template: impl Into<String>) -> Self {
        Self {
            fetcher,
            url_template: url_template.into(),
            analyzer: HeuristicAnalyzer,
        }
    }
}

#[async_trait]
impl SearchProvider for HtmlSearchProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let url = self.url_template.replace("{query}", &encoded);

        let page = match self.fetcher.fetch(&url, 0).await {
            FetchOutcome::Success(page) => page,
            outcome => return Err(anyhow!("search fetch failed ({})", outcome.label())),
        };
        let search_host = web::domain_of(&page.final_url);

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for link in self.analyzer.extract_links(&page.final_url, &page.html) {
            let Some(target) = resolve_result_link(&link.url, &search_host) else {
                continue;
            };
            if seen.insert(web::normalize_url(&target)) {
                results.push(target);
                if results.len() >= limit {
                    break;
                }
            }
        }
        debug!("search '{query}' resolved {} result urls", results.len());
        Ok(results)
    }
}

/// Turn one anchor from a results page into a crawlable target.
///
/// Links leaving the engine's domain are results as-is. Links staying on
/// it are either redirect wrappers carrying the target in a query
/// parameter, or engine chrome (pagination, settings) worth dropping.
fn resolve_result_link(raw: &str, search_host: &str) -> Option<String> {
    if !web::is_http(raw) {
        return None;
    }
    let host = web::domain_of(raw);
    if host.is_empty() {
        return None;
    }
    let same_engine =
        web::second_level_label(&host) == web::second_level_label(search_host);
    if !same_engine {
        return Some(raw.to_string());
    }
    let parsed = Url::parse(raw).ok()?;
    for (key, value) in parsed.query_pairs() {
        if matches!(key.as_ref(), "uddg" | "url" | "u") && value.starts_with("http") {
            return Some(value.into_owned());
        }
    }
    None
}
