//! Priority frontier: the queue of not-yet-fetched URL candidates,
//! ordered by score with insertion-stable tie-breaking.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A URL waiting to be crawled. Lives only inside the frontier.
#[derive(Debug, Clone)]
pub struct CrawlCandidate {
    pub url: String,
    pub depth: usize,
    pub link_text: String,
    pub score: f32,
    /// Human-readable breakdown of how `score` was assembled.
    pub reason: String,
}

impl CrawlCandidate {
    pub fn new(
        url: impl Into<String>,
        depth: usize,
        link_text: impl Into<String>,
        score: f32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            depth,
            link_text: link_text.into(),
            score,
            reason: reason.into(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    candidate: CrawlCandidate,
    /// Monotonic insertion counter; earlier entries win score ties.
    seq: u64,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.candidate
            .score
            .total_cmp(&other.candidate.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

/// Max-heap of crawl candidates.
///
/// Does not deduplicate: pushing the same URL twice at different scores is
/// legal, and the higher-scored entry pops first. The traversal loop owns
/// the visited-set check.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: CrawlCandidate) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { candidate, seq });
    }

    /// Remove and return the highest-scored candidate.
    pub fn pop(&mut self) -> Option<CrawlCandidate> {
        self.heap.pop().map(|e| e.candidate)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
