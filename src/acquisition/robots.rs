//! robots.txt parsing and a per-host rules cache.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// One Allow/Disallow line from a matching user-agent group.
#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    allow: bool,
}

/// Parsed rules applying to our user agent on one host.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    rules: Vec<Rule>,
    pub crawl_delay: Option<f32>,
}

impl RobotsRules {
    /// Everything permitted; used when robots.txt is absent or unreadable.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Longest matching pattern wins; Allow beats Disallow on equal
    /// length. No matching rule means allowed.
    pub fn is_allowed(&self, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };
        let mut verdict = true;
        let mut longest = 0;
        for rule in &self.rules {
            if pattern_matches(path, &rule.pattern) {
                let len = rule.pattern.len();
                if len > longest || (len == longest && rule.allow) {
                    longest = len;
                    verdict = rule.allow;
                }
            }
        }
        verdict
    }
}

/// Parse a robots.txt body, keeping the groups addressed to `user_agent`
/// (or to `*` when no specific group matches).
pub fn parse_robots(txt: &str, user_agent: &str) -> RobotsRules {
    let ua_lower = user_agent.to_lowercase();
    let mut specific = RobotsRules::default();
    let mut wildcard = RobotsRules::default();
    let mut saw_specific = false;

    // Which groups the current user-agent lines select
    let mut in_specific = false;
    let mut in_wildcard = false;
    let mut last_was_ua = false;

    for raw in txt.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                let ua = value.to_lowercase();
                // Consecutive user-agent lines extend the same group
                if !last_was_ua {
                    in_specific = false;
                    in_wildcard = false;
                }
                if ua == "*" {
                    in_wildcard = true;
                } else if ua_lower.contains(&ua) || ua == ua_lower {
                    in_specific = true;
                    saw_specific = true;
                }
                last_was_ua = true;
            }
            "allow" | "disallow" => {
                last_was_ua = false;
                if value.is_empty() {
                    continue;
                }
                let rule = Rule {
                    pattern: value.to_string(),
                    allow: key == "allow",
                };
                if in_specific {
                    specific.rules.push(rule);
                } else if in_wildcard {
                    wildcard.rules.push(rule);
                }
            }
            "crawl-delay" => {
                last_was_ua = false;
                if let Ok(delay) = value.parse::<f32>() {
                    if in_specific {
                        specific.crawl_delay = Some(delay);
                    } else if in_wildcard {
                        wildcard.crawl_delay = Some(delay);
                    }
                }
            }
            _ => {
                last_was_ua = false;
            }
        }
    }

    if saw_specific {
        specific
    } else {
        wildcard
    }
}

/// robots.txt pattern match: prefix semantics with `*` wildcards and an
/// optional `$` end anchor.
fn pattern_matches(path: &str, pattern: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let mut remainder = path;
    let mut segments = pattern.split('*');

    // First segment is anchored at the start of the path
    let Some(first) = segments.next() else {
        return true;
    };
    if !remainder.starts_with(first) {
        return false;
    }
    remainder = &remainder[first.len()..];

    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        match remainder.find(segment) {
            Some(at) => remainder = &remainder[at + segment.len()..],
            None => return false,
        }
    }

    if anchored {
        // A trailing `*` before `$` already consumed the tail
        pattern.ends_with('*') || remainder.is_empty()
    } else {
        true
    }
}

/// Per-host robots rules, fetched once and cached for the session.
pub struct RobotsCache {
    user_agent: String,
    rules: Mutex<HashMap<String, Arc<RobotsRules>>>,
}

impl RobotsCache {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            rules: Mutex::new(HashMap::new()),
        }
    }

    /// Rules for the host serving `url`. Fetch failures and non-200
    /// responses yield permissive rules, cached like any other result.
    pub async fn rules_for(&self, client: &reqwest::Client, url: &str) -> Arc<RobotsRules> {
        let Ok(parsed) = Url::parse(url) else {
            return Arc::new(RobotsRules::permissive());
        };
        let Some(host) = parsed.host_str() else {
            return Arc::new(RobotsRules::permissive());
        };
        let key = format!("{}://{}", parsed.scheme(), host);

        {
            let cache = self.rules.lock().await;
            if let Some(rules) = cache.get(&key) {
                return rules.clone();
            }
        }

        let robots_url = format!("{key}/robots.txt");
        let rules = match client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => parse_robots(&body, &self.user_agent),
                Err(_) => RobotsRules::permissive(),
            },
            Ok(resp) => {
                debug!("robots.txt at {robots_url} returned {}", resp.status());
                RobotsRules::permissive()
            }
            Err(e) => {
                debug!("failed to fetch {robots_url}: {e}");
                RobotsRules::permissive()
            }
        };

        let rules = Arc::new(rules);
        self.rules.lock().await.insert(key, rules.clone());
        rules
    }
}
