//! Persistence boundary: everything the crawl produces goes through the
//! `IntelStore` trait. Failures here are logged by the caller and never
//! abort a crawl.

use crate::acquisition::ExtractedLink;
use crate::entity::{EntityIntel, PageIntel, PageType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// One crawled page, as returned from a crawl session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub final_url: String,
    pub domain: String,
    pub title: Option<String>,
    pub page_type: PageType,
    pub depth: usize,
    pub score: f32,
    pub score_reason: String,
    pub text_chars: usize,
    pub links_found: usize,
    pub findings_count: usize,
    pub has_high_confidence_intel: bool,
    pub fetched_at: DateTime<Utc>,
}

/// Capability contract for persisting crawl output. Every save returns
/// the id of the stored record.
#[async_trait]
pub trait IntelStore: Send + Sync {
    async fn save_page(&self, record: &PageRecord) -> Result<String>;
    async fn save_links(&self, from_url: &str, links: &[ExtractedLink]) -> Result<usize>;
    async fn save_intelligence(
        &self,
        entity_id: &str,
        page_url: &str,
        intel: &PageIntel,
    ) -> Result<String>;
    async fn save_entity(&self, intel: &EntityIntel) -> Result<String>;
    async fn save_relationship(&self, from_entity: &str, to_entity: &str, kind: &str)
        -> Result<String>;
    async fn load_entity(&self, entity_id: &str) -> Result<Option<EntityIntel>>;
}

#[derive(Default)]
struct MemoryInner {
    pages: Vec<PageRecord>,
    links: HashMap<String, Vec<ExtractedLink>>,
    entities: HashMap<String, EntityIntel>,
    relationships: Vec<(String, String, String)>,
}

/// In-memory store; the default for one-shot sessions and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{n}")
    }

    pub async fn page_count(&self) -> usize {
        self.inner.lock().await.pages.len()
    }

    pub async fn pages(&self) -> Vec<PageRecord> {
        self.inner.lock().await.pages.clone()
    }

    pub async fn relationship_count(&self) -> usize {
        self.inner.lock().await.relationships.len()
    }

    /// Rebuild a store from a session log written by [`JsonlStore`].
    /// Lines that do not parse are skipped.
    pub async fn from_session_log(path: &Path) -> Result<Self> {
        let store = MemoryStore::new();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session log: {}", path.display()))?;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let Ok(record) = serde_json::from_str::<serde_json::Value>(line) else {
                continue;
            };
            match record["kind"].as_str() {
                Some("page") => {
                    if let Ok(page) = serde_json::from_value::<PageRecord>(record["data"].clone()) {
                        store.save_page(&page).await?;
                    }
                }
                Some("intel") => {
                    let entity_id = record["data"]["entity_id"].as_str().unwrap_or_default();
                    let page_url = record["data"]["page_url"].as_str().unwrap_or_default();
                    let intel = serde_json::from_value::<PageIntel>(record["data"]["intel"].clone());
                    if let (false, Ok(intel)) = (entity_id.is_empty(), intel) {
                        store.save_intelligence(entity_id, page_url, &intel).await?;
                    }
                }
                Some("entity") => {
                    if let Ok(entity) = serde_json::from_value::<EntityIntel>(record["data"].clone())
                    {
                        store.save_entity(&entity).await?;
                    }
                }
                _ => {}
            }
        }
        Ok(store)
    }
}

#[async_trait]
impl IntelStore for MemoryStore {
    async fn save_page(&self, record: &PageRecord) -> Result<String> {
        self.inner.lock().await.pages.push(record.clone());
        Ok(self.mint("page"))
    }

    async fn save_links(&self, from_url: &str, links: &[ExtractedLink]) -> Result<usize> {
        self.inner
            .lock()
            .await
            .links
            .entry(from_url.to_string())
            .or_default()
            .extend(links.iter().cloned());
        Ok(links.len())
    }

    async fn save_intelligence(
        &self,
        entity_id: &str,
        page_url: &str,
        intel: &PageIntel,
    ) -> Result<String> {
        let mut inner = self.inner.lock().await;
        inner
            .entities
            .entry(entity_id.to_string())
            .or_insert_with(|| EntityIntel::new(entity_id))
            .absorb(page_url, intel);
        drop(inner);
        Ok(self.mint("intel"))
    }

    async fn save_entity(&self, intel: &EntityIntel) -> Result<String> {
        self.inner
            .lock()
            .await
            .entities
            .insert(intel.entity_id.clone(), intel.clone());
        Ok(self.mint("entity"))
    }

    async fn save_relationship(
        &self,
        from_entity: &str,
        to_entity: &str,
        kind: &str,
    ) -> Result<String> {
        self.inner.lock().await.relationships.push((
            from_entity.to_string(),
            to_entity.to_string(),
            kind.to_string(),
        ));
        Ok(self.mint("rel"))
    }

    async fn load_entity(&self, entity_id: &str) -> Result<Option<EntityIntel>> {
        Ok(self.inner.lock().await.entities.get(entity_id).cloned())
    }
}

/// Append-only JSONL record written by [`JsonlStore`].
#[derive(Debug, Serialize)]
struct JsonlRecord<'a, T: Serialize> {
    kind: &'a str,
    id: &'a str,
    timestamp: String,
    data: T,
}

/// Store that mirrors every write into an append-only JSONL file while
/// keeping reads served from memory.
pub struct JsonlStore {
    memory: MemoryStore,
    file: Mutex<File>,
}

impl JsonlStore {
    /// Open or create the JSONL sink at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open intel log: {}", path.display()))?;
        Ok(Self {
            memory: MemoryStore::new(),
            file: Mutex::new(file),
        })
    }

    async fn append<T: Serialize>(&self, kind: &str, id: &str, data: T) -> Result<()> {
        let line = serde_json::to_string(&JsonlRecord {
            kind,
            id,
            timestamp: Utc::now().to_rfc3339(),
            data,
        })?;
        let mut file = self.file.lock().await;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[async_trait]
impl IntelStore for JsonlStore {
    async fn save_page(&self, record: &PageRecord) -> Result<String> {
        let id = self.memory.save_page(record).await?;
        self.append("page", &id, record).await?;
        Ok(id)
    }

    async fn save_links(&self, from_url: &str, links: &[ExtractedLink]) -> Result<usize> {
        let n = self.memory.save_links(from_url, links).await?;
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        self.append("links", from_url, urls).await?;
        Ok(n)
    }

    async fn save_intelligence(
        &self,
        entity_id: &str,
        page_url: &str,
        intel: &PageIntel,
    ) -> Result<String> {
        let id = self.memory.save_intelligence(entity_id, page_url, intel).await?;
        self.append("intel", &id, serde_json::json!({
            "entity_id": entity_id,
            "page_url": page_url,
            "intel": intel,
        }))
        .await?;
        Ok(id)
    }

    async fn save_entity(&self, intel: &EntityIntel) -> Result<String> {
        let id = self.memory.save_entity(intel).await?;
        self.append("entity", &id, intel).await?;
        Ok(id)
    }

    async fn save_relationship(
        &self,
        from_entity: &str,
        to_entity: &str,
        kind: &str,
    ) -> Result<String> {
        let id = self
            .memory
            .save_relationship(from_entity, to_entity, kind)
            .await?;
        self.append(
            "relationship",
            &id,
            serde_json::json!({"from": from_entity, "to": to_entity, "kind": kind}),
        )
        .await?;
        Ok(id)
    }

    async fn load_entity(&self, entity_id: &str) -> Result<Option<EntityIntel>> {
        self.memory.load_entity(entity_id).await
    }
}
