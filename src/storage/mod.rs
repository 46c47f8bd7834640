//! Session persistence: page records, link edges, and accumulated
//! intelligence, in memory or appended to a JSONL session log.

mod store;

pub use store::{IntelStore, JsonlStore, MemoryStore, PageRecord};
