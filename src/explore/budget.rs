//! Per-session crawl budgets: the visited set and the per-domain page cap.

use std::collections::{HashMap, HashSet};

/// Normalized URLs this session has already committed to fetching.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.seen.contains(normalized)
    }

    /// Returns false if the URL was already present.
    pub fn insert(&mut self, normalized: &str) -> bool {
        self.seen.insert(normalized.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Counts fetch attempts per domain against a fixed cap.
///
/// The counter moves on every `try_take`, even when the answer is no and
/// even when the fetch later fails; a domain's budget measures attempts,
/// not successes, which keeps one slow host from eating the session on
/// retries.
#[derive(Debug)]
pub struct DomainBudget {
    cap: usize,
    counts: HashMap<String, usize>,
}

impl DomainBudget {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            counts: HashMap::new(),
        }
    }

    /// Charge one attempt to `domain` and report whether it is still
    /// within budget.
    pub fn try_take(&mut self, domain: &str) -> bool {
        let count = self.counts.entry(domain.to_string()).or_insert(0);
        *count += 1;
        *count <= self.cap
    }

    pub fn used(&self, domain: &str) -> usize {
        self.counts.get(domain).copied().unwrap_or(0)
    }
}
