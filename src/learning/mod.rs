//! Cross-session learning: outcome statistics, reliability estimates,
//! and snapshot persistence.

mod learner;
mod snapshot;
mod stats;

pub use learner::CrawlLearner;
pub use snapshot::{LearnerSnapshot, SNAPSHOT_VERSION};
pub use stats::{
    pattern_key, CrawlOutcome, DomainStats, EntityTypeMemory, LearningStats, PageStrategy,
    PageTypePattern, EMA_ALPHA,
};
