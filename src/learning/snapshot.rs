//! Snapshot persistence for cross-session learner state.

use super::stats::{DomainStats, EntityTypeMemory, PageTypePattern};
use crate::entity::EntityType;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized learner state. The recent-outcome ring buffer is session
/// diagnostics and is deliberately not part of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub outcomes_recorded: u64,
    #[serde(default)]
    pub domains: HashMap<String, DomainStats>,
    #[serde(default)]
    pub patterns: HashMap<String, PageTypePattern>,
    #[serde(default)]
    pub entity_memory: HashMap<EntityType, EntityTypeMemory>,
}

/// Write a snapshot. Write-then-rename keeps the previous snapshot
/// intact if the process dies mid-write.
pub fn save(path: &Path, snapshot: &LearnerSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace snapshot {}", path.display()))?;
    Ok(())
}

/// Read a snapshot. `None` when no snapshot exists yet; an error only
/// for unreadable or corrupt files.
pub fn load(path: &Path) -> Result<Option<LearnerSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot = serde_json::from_str(&content)
        .with_context(|| format!("invalid snapshot {}", path.display()))?;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("learner.json");

        let mut domains = HashMap::new();
        domains.insert(
            "example.com".to_string(),
            DomainStats::new("example.com", Utc::now()),
        );
        let snapshot = LearnerSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            outcomes_recorded: 42,
            domains,
            patterns: HashMap::new(),
            entity_memory: HashMap::new(),
        };

        save(&path, &snapshot).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.outcomes_recorded, 42);
        assert!(loaded.domains.contains_key("example.com"));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learner.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_err());
    }
}
