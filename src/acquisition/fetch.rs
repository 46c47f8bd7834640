//! Page fetching: the transport seam between the crawl loop and the
//! network, with per-host politeness delays and robots.txt enforcement.

use crate::acquisition::robots::RobotsCache;
use crate::config::FetchConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// A successfully fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub html: String,
}

/// What happened when we tried to fetch a URL. The crawl loop matches on
/// this explicitly; only `Success` produces a page cycle.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(FetchedPage),
    Timeout,
    HttpError { status: u16 },
    NotHtml { content_type: String },
    TransportError { message: String },
    /// robots.txt forbids this path for our user agent.
    Disallowed,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "ok",
            FetchOutcome::Timeout => "timeout",
            FetchOutcome::HttpError { .. } => "http-error",
            FetchOutcome::NotHtml { .. } => "not-html",
            FetchOutcome::TransportError { .. } => "transport-error",
            FetchOutcome::Disallowed => "disallowed",
        }
    }
}

/// Capability contract for fetching pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, depth: usize) -> FetchOutcome;
}

/// Enforces a minimum gap between successive requests to the same host.
pub struct RateLimiter {
    min_delay: Duration,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay_ms: u64) -> Self {
        Self {
            min_delay: Duration::from_millis(min_delay_ms),
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until this host may be contacted again. A robots.txt
    /// crawl-delay larger than our own minimum takes precedence.
    pub async fn acquire(&self, host: &str, crawl_delay: Option<f32>) {
        let delay = crawl_delay
            .map(|d| Duration::from_secs_f32(d.max(0.0)))
            .map(|d| d.max(self.min_delay))
            .unwrap_or(self.min_delay);

        let mut last = self.last_request.lock().await;
        if let Some(prev) = last.get(host) {
            let elapsed = prev.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        last.insert(host.to_string(), Instant::now());
    }
}

/// Default fetcher: plain HTTP GET via reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
    robots: RobotsCache,
    respect_robots: bool,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            limiter: RateLimiter::new(config.min_delay_ms),
            robots: RobotsCache::new(&config.user_agent),
            respect_robots: config.respect_robots,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, depth: usize) -> FetchOutcome {
        let parsed = Url::parse(url).ok();
        let host = parsed
            .as_ref()
            .and_then(|u| u.host_str())
            .unwrap_or("")
            .to_string();

        let mut crawl_delay = None;
        if self.respect_robots {
            let rules = self.robots.rules_for(&self.client, url).await;
            let path = parsed
                .as_ref()
                .map(|u| match u.query() {
                    Some(q) => format!("{}?{q}", u.path()),
                    None => u.path().to_string(),
                })
                .unwrap_or_else(|| "/".to_string());
            if !rules.is_allowed(&path) {
                debug!("robots.txt disallows {url}");
                return FetchOutcome::Disallowed;
            }
            crawl_delay = rules.crawl_delay;
        }

        self.limiter.acquire(&host, crawl_delay).await;
        debug!("fetching {url} (depth {depth})");

        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return FetchOutcome::Timeout,
            Err(e) => {
                return FetchOutcome::TransportError {
                    message: e.to_string(),
                }
            }
        };

        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        if !resp.status().is_success() {
            return FetchOutcome::HttpError { status };
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        // A missing content-type header is common enough to tolerate
        if !content_type.is_empty() && !content_type.contains("html") {
            return FetchOutcome::NotHtml { content_type };
        }

        match resp.text().await {
            Ok(mut html) => {
                truncate_at_boundary(&mut html, self.max_body_bytes);
                FetchOutcome::Success(FetchedPage {
                    url: url.to_string(),
                    final_url,
                    status,
                    html,
                })
            }
            Err(e) if e.is_timeout() => FetchOutcome::Timeout,
            Err(e) => FetchOutcome::TransportError {
                message: e.to_string(),
            },
        }
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_at_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}
