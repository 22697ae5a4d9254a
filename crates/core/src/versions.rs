//! Per-file version chains.
//!
//! The [`VersionStore`] keeps every version in an arena (`Vec<Option<..>>`)
//! with id and file side tables, so records are owned in exactly one place.
//! Versions are append-only: reverting creates a new version, and deleting a
//! non-current version simply unlinks it from the indices without repairing
//! descendants' parent pointers (the chain is an audit trail, not a strict
//! DAG).

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::diff::{DiffEngine, Hunk};
use crate::errors::VersionError;
use crate::models::{Version, VersionStats};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The diff between two stored versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDiff {
    /// Id of the older side.
    pub version_a: String,
    /// Id of the newer side.
    pub version_b: String,
    /// Total added lines across hunks.
    pub additions: usize,
    /// Total deleted lines across hunks.
    pub deletions: usize,
    /// Ordered hunks.
    pub hunks: Vec<Hunk>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory store of per-file version chains.
pub struct VersionStore {
    diff_engine: DiffEngine,
    /// Arena of version records; deleted slots become `None`.
    arena: Vec<Option<Version>>,
    /// Version id -> arena index.
    by_id: HashMap<String, usize>,
    /// File id -> arena indices, oldest first.
    by_file: HashMap<String, Vec<usize>>,
}

impl VersionStore {
    /// Create an empty store with the given diff engine.
    pub fn new(diff_engine: DiffEngine) -> Self {
        Self {
            diff_engine,
            arena: Vec::new(),
            by_id: HashMap::new(),
            by_file: HashMap::new(),
        }
    }

    /// Snapshot `content` as the file's new current version.
    ///
    /// The label is `v{N}.0.0` with `N` = current version count + 1, and the
    /// parent pointer is the previous current version (none for the first).
    pub fn create_version(
        &mut self,
        file_id: &str,
        content: &str,
        message: &str,
        author: &str,
    ) -> Version {
        let count = self.by_file.get(file_id).map(Vec::len).unwrap_or(0);
        let label = format!("v{}.0.0", count + 1);
        let parent_version = self
            .by_file
            .get(file_id)
            .and_then(|chain| chain.last())
            .and_then(|&idx| self.arena.get(idx))
            .and_then(|slot| slot.as_ref())
            .map(|v| v.id.clone());

        let version = Version {
            id: Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            label: label.clone(),
            content: content.to_string(),
            author: author.to_string(),
            message: message.to_string(),
            parent_version,
            created_at: Utc::now(),
        };

        let idx = self.arena.len();
        self.by_id.insert(version.id.clone(), idx);
        self.by_file.entry(file_id.to_string()).or_default().push(idx);
        self.arena.push(Some(version.clone()));

        info!(file_id, label, author, "created version");
        version
    }

    /// Look up a version by id.
    pub fn get_version(&self, version_id: &str) -> Option<&Version> {
        self.by_id
            .get(version_id)
            .and_then(|&idx| self.arena.get(idx))
            .and_then(|slot| slot.as_ref())
    }

    /// All live versions of a file, oldest first.
    pub fn get_history(&self, file_id: &str) -> Vec<&Version> {
        self.by_file
            .get(file_id)
            .map(|chain| {
                chain
                    .iter()
                    .filter_map(|&idx| self.arena.get(idx).and_then(|slot| slot.as_ref()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The file's current (most recent) version, if any.
    pub fn get_latest(&self, file_id: &str) -> Option<&Version> {
        self.by_file
            .get(file_id)?
            .last()
            .and_then(|&idx| self.arena.get(idx))
            .and_then(|slot| slot.as_ref())
    }

    /// Diff two stored versions.
    pub fn diff(&self, version_a: &str, version_b: &str) -> Result<VersionDiff, VersionError> {
        let a = self
            .get_version(version_a)
            .ok_or_else(|| VersionError::VersionNotFound(version_a.to_string()))?;
        let b = self
            .get_version(version_b)
            .ok_or_else(|| VersionError::VersionNotFound(version_b.to_string()))?;

        let hunks = self.diff_engine.compute_diff(&a.content, &b.content);
        let additions = hunks.iter().map(Hunk::additions).sum();
        let deletions = hunks.iter().map(Hunk::deletions).sum();
        Ok(VersionDiff {
            version_a: a.id.clone(),
            version_b: b.id.clone(),
            additions,
            deletions,
            hunks,
        })
    }

    /// Create a new version whose content equals `version_id`'s.
    ///
    /// History is never rewritten; the revert is just another version on top
    /// of the chain, authored by `author`.
    pub fn revert(
        &mut self,
        file_id: &str,
        version_id: &str,
        author: &str,
    ) -> Result<Version, VersionError> {
        let target = self
            .get_version(version_id)
            .ok_or_else(|| VersionError::VersionNotFound(version_id.to_string()))?;
        if target.file_id != file_id {
            return Err(VersionError::VersionNotInFile {
                version_id: version_id.to_string(),
                file_id: file_id.to_string(),
            });
        }
        let content = target.content.clone();
        let message = format!("Revert to {}", target.label);
        debug!(file_id, version_id, "reverting");
        Ok(self.create_version(file_id, &content, &message, author))
    }

    /// Remove a non-current version from its file's chain.
    ///
    /// Parent pointers of descendants are left untouched.
    pub fn delete_version(&mut self, version_id: &str) -> Result<(), VersionError> {
        let &idx = self
            .by_id
            .get(version_id)
            .ok_or_else(|| VersionError::VersionNotFound(version_id.to_string()))?;
        let file_id = match self.arena.get(idx).and_then(|slot| slot.as_ref()) {
            Some(v) => v.file_id.clone(),
            None => return Err(VersionError::VersionNotFound(version_id.to_string())),
        };

        let chain = self
            .by_file
            .get_mut(&file_id)
            .ok_or_else(|| VersionError::FileNotFound(file_id.clone()))?;
        if chain.last() == Some(&idx) {
            return Err(VersionError::CurrentVersionProtected(
                version_id.to_string(),
            ));
        }

        chain.retain(|&i| i != idx);
        self.by_id.remove(version_id);
        if let Some(slot) = self.arena.get_mut(idx) {
            *slot = None;
        }
        info!(file_id, version_id, "deleted version");
        Ok(())
    }

    /// Aggregate statistics over a file's live versions.
    pub fn stats(&self, file_id: &str) -> VersionStats {
        let mut stats = VersionStats::default();
        for version in self.get_history(file_id) {
            stats.version_count += 1;
            stats.total_size += version.content.len();
            if !stats.authors.iter().any(|a| a == &version.author) {
                stats.authors.push(version.author.clone());
            }
        }
        stats
    }

    /// The diff engine this store was constructed with.
    pub fn diff_engine(&self) -> &DiffEngine {
        &self.diff_engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VersionStore {
        VersionStore::new(DiffEngine::new())
    }

    #[test]
    fn test_labels_increase_per_file() {
        let mut store = store();
        let v1 = store.create_version("doc-1", "a", "first", "alice");
        let v2 = store.create_version("doc-1", "b", "second", "alice");
        let v3 = store.create_version("doc-1", "c", "third", "bob");
        assert_eq!(v1.label, "v1.0.0");
        assert_eq!(v2.label, "v2.0.0");
        assert_eq!(v3.label, "v3.0.0");
        assert_eq!(v2.parent_version.as_deref(), Some(v1.id.as_str()));
        assert_eq!(v3.parent_version.as_deref(), Some(v2.id.as_str()));
        assert!(v1.parent_version.is_none());
    }

    #[test]
    fn test_label_sequences_are_independent_per_file() {
        let mut store = store();
        store.create_version("doc-1", "a", "m", "alice");
        store.create_version("doc-1", "b", "m", "alice");
        let other = store.create_version("doc-2", "x", "m", "bob");
        assert_eq!(other.label, "v1.0.0");
    }

    #[test]
    fn test_history_and_latest() {
        let mut store = store();
        let v1 = store.create_version("doc", "one", "m1", "alice");
        let v2 = store.create_version("doc", "two", "m2", "alice");
        let history = store.get_history("doc");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, v1.id);
        assert_eq!(history[1].id, v2.id);
        assert_eq!(store.get_latest("doc").unwrap().id, v2.id);
        assert!(store.get_latest("missing").is_none());
    }

    #[test]
    fn test_diff_between_versions() {
        let mut store = store();
        let v1 = store.create_version("doc", "line1\nline2", "m", "alice");
        let v2 = store.create_version("doc", "line1\nline2-modified\nline3", "m", "bob");
        let diff = store.diff(&v1.id, &v2.id).unwrap();
        assert_eq!(diff.additions, 2);
        assert_eq!(diff.deletions, 1);
        assert_eq!(diff.hunks.len(), 1);

        let err = store.diff(&v1.id, "unknown").unwrap_err();
        assert!(matches!(err, VersionError::VersionNotFound(_)));
    }

    #[test]
    fn test_revert_creates_new_version() {
        let mut store = store();
        let v1 = store.create_version("doc", "original", "m", "alice");
        store.create_version("doc", "changed", "m", "alice");
        let reverted = store.revert("doc", &v1.id, "carol").unwrap();
        assert_eq!(reverted.label, "v3.0.0");
        assert_eq!(reverted.content, "original");
        assert_eq!(reverted.message, "Revert to v1.0.0");
        assert_eq!(store.get_history("doc").len(), 3);
    }

    #[test]
    fn test_revert_unknown_version() {
        let mut store = store();
        store.create_version("doc", "a", "m", "alice");
        let err = store.revert("doc", "nope", "alice").unwrap_err();
        assert!(matches!(err, VersionError::VersionNotFound(_)));
    }

    #[test]
    fn test_revert_version_of_other_file() {
        let mut store = store();
        let other = store.create_version("doc-2", "x", "m", "alice");
        store.create_version("doc-1", "a", "m", "alice");
        let err = store.revert("doc-1", &other.id, "alice").unwrap_err();
        assert!(matches!(err, VersionError::VersionNotInFile { .. }));
    }

    #[test]
    fn test_delete_current_version_is_rejected() {
        let mut store = store();
        store.create_version("doc", "a", "m", "alice");
        let v2 = store.create_version("doc", "b", "m", "alice");
        let err = store.delete_version(&v2.id).unwrap_err();
        assert!(matches!(err, VersionError::CurrentVersionProtected(_)));
        assert_eq!(store.get_history("doc").len(), 2);
    }

    #[test]
    fn test_delete_old_version_keeps_latest() {
        let mut store = store();
        let v1 = store.create_version("doc", "a", "m", "alice");
        let v2 = store.create_version("doc", "b", "m", "alice");
        let v3 = store.create_version("doc", "c", "m", "alice");
        store.delete_version(&v2.id).unwrap();

        assert!(store.get_version(&v2.id).is_none());
        assert_eq!(store.get_latest("doc").unwrap().id, v3.id);
        let history = store.get_history("doc");
        assert_eq!(history.len(), 2);
        // v3's parent pointer still names the deleted v2: not repaired.
        assert_eq!(history[1].parent_version.as_deref(), Some(v2.id.as_str()));
        let _ = v1;
    }

    #[test]
    fn test_delete_unknown_version() {
        let mut store = store();
        let err = store.delete_version("missing").unwrap_err();
        assert!(matches!(err, VersionError::VersionNotFound(_)));
    }

    #[test]
    fn test_stats() {
        let mut store = store();
        store.create_version("doc", "abcd", "m", "alice");
        store.create_version("doc", "efghij", "m", "bob");
        store.create_version("doc", "kl", "m", "alice");
        let stats = store.stats("doc");
        assert_eq!(stats.version_count, 3);
        assert_eq!(stats.total_size, 12);
        assert_eq!(stats.authors, vec!["alice".to_string(), "bob".to_string()]);

        let empty = store.stats("missing");
        assert_eq!(empty.version_count, 0);
    }
}
