//! The branch manager.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::diff::{DiffEngine, Hunk};
use crate::errors::BranchError;
use crate::models::{
    Branch, BranchStatus, BranchStatusReport, ResolutionChoice, ResolutionEntry, Version,
};
use crate::versions::{VersionDiff, VersionStore};

/// Name of the branch trial merges run against.
const MAIN_BRANCH: &str = "main";

/// Manages the branches of all files.
///
/// The version store is passed into each operation that reads or commits
/// snapshots, so the manager never owns file content itself.
pub struct BranchManager {
    diff_engine: DiffEngine,
    /// Arena of branch records; deleted slots become `None`.
    arena: Vec<Option<Branch>>,
    /// Branch id -> arena index.
    by_id: HashMap<String, usize>,
}

impl BranchManager {
    /// Create an empty manager with the given diff engine.
    pub fn new(diff_engine: DiffEngine) -> Self {
        Self {
            diff_engine,
            arena: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Creation & lookups
    // -----------------------------------------------------------------------

    /// Create an active branch pointing at the file's current version.
    ///
    /// A file with no versions yet gets a freshly minted placeholder pointer;
    /// content lookups through it resolve to the empty string.
    pub fn create_branch(
        &mut self,
        name: &str,
        file_id: &str,
        parent_id: Option<&str>,
        created_by: &str,
        store: &VersionStore,
    ) -> Branch {
        let version = store
            .get_latest(file_id)
            .map(|v| v.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            file_id: file_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            version,
            created_by: created_by.to_string(),
            status: BranchStatus::Active,
            created_at: Utc::now(),
        };

        let idx = self.arena.len();
        self.by_id.insert(branch.id.clone(), idx);
        self.arena.push(Some(branch.clone()));

        info!(name, file_id, created_by, "created branch");
        branch
    }

    /// Look up a branch by id.
    pub fn get(&self, branch_id: &str) -> Option<&Branch> {
        self.by_id
            .get(branch_id)
            .and_then(|&idx| self.arena.get(idx))
            .and_then(|slot| slot.as_ref())
    }

    /// Look up a branch by file and name.
    pub fn get_by_name(&self, file_id: &str, name: &str) -> Option<&Branch> {
        self.arena
            .iter()
            .filter_map(|slot| slot.as_ref())
            .find(|b| b.file_id == file_id && b.name == name)
    }

    /// All branches of a file, in creation order.
    pub fn branches_for_file(&self, file_id: &str) -> Vec<&Branch> {
        self.arena
            .iter()
            .filter_map(|slot| slot.as_ref())
            .filter(|b| b.file_id == file_id)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Merge `source_id` into `target_id`.
    ///
    /// The merge base is the target branch's pointed-at snapshot and "yours"
    /// is the file's current latest content; for an up-to-date target branch
    /// both are the same text, which stands in for a true common ancestor.
    ///
    /// On success a new version with the merged content is committed, the
    /// target is repointed at it, and the source is marked merged. On
    /// conflict the source is marked abandoned **before** the error is
    /// returned.
    pub fn merge(
        &mut self,
        source_id: &str,
        target_id: &str,
        store: &mut VersionStore,
    ) -> Result<Version, BranchError> {
        let source = self
            .get(source_id)
            .ok_or_else(|| BranchError::BranchNotFound(source_id.to_string()))?
            .clone();
        let target = self
            .get(target_id)
            .ok_or_else(|| BranchError::BranchNotFound(target_id.to_string()))?
            .clone();

        if source.status != BranchStatus::Active {
            return Err(BranchError::NotActive {
                id: source.id,
                status: source.status.to_string(),
            });
        }
        if target.status != BranchStatus::Active {
            return Err(BranchError::NotActive {
                id: target.id,
                status: target.status.to_string(),
            });
        }
        if source.file_id != target.file_id {
            return Err(BranchError::FileMismatch {
                source_branch: source.id,
                target: target.id,
            });
        }

        let source_content = pointed_content(store, &source.version);
        let target_content = pointed_content(store, &target.version);
        let latest_content = store
            .get_latest(&source.file_id)
            .map(|v| v.content.clone())
            .unwrap_or_else(|| target_content.clone());

        match self
            .diff_engine
            .three_way_merge(&target_content, &source_content, &latest_content)
        {
            None => {
                // The failed merge still abandons the source branch.
                self.set_status(source_id, BranchStatus::Abandoned);
                warn!(
                    source = source_id,
                    target = target_id,
                    "merge conflict, source branch abandoned"
                );
                Err(BranchError::MergeConflict {
                    source_branch: source_id.to_string(),
                    target: target_id.to_string(),
                })
            }
            Some(merged) => {
                let message = format!("Merge branch '{}' into '{}'", source.name, target.name);
                let version =
                    store.create_version(&source.file_id, &merged, &message, &source.created_by);
                self.set_version(target_id, &version.id);
                self.set_status(source_id, BranchStatus::Merged);
                info!(
                    source = source_id,
                    target = target_id,
                    version = %version.label,
                    "merged branch"
                );
                Ok(version)
            }
        }
    }

    /// Mark a branch abandoned. Idempotent.
    pub fn abandon(&mut self, branch_id: &str) -> Result<(), BranchError> {
        if self.get(branch_id).is_none() {
            return Err(BranchError::BranchNotFound(branch_id.to_string()));
        }
        self.set_status(branch_id, BranchStatus::Abandoned);
        info!(branch_id, "abandoned branch");
        Ok(())
    }

    /// Report a branch's status and mergeability.
    ///
    /// `has_conflicts` runs a trial merge against the file's branch named
    /// `"main"` (when one exists and is not the branch itself) without
    /// committing anything.
    pub fn branch_status(
        &self,
        branch_id: &str,
        store: &VersionStore,
    ) -> Result<BranchStatusReport, BranchError> {
        let branch = self
            .get(branch_id)
            .ok_or_else(|| BranchError::BranchNotFound(branch_id.to_string()))?;

        let has_conflicts = match self.get_by_name(&branch.file_id, MAIN_BRANCH) {
            Some(main) if main.id != branch.id => {
                let branch_content = pointed_content(store, &branch.version);
                let main_content = pointed_content(store, &main.version);
                let latest_content = store
                    .get_latest(&branch.file_id)
                    .map(|v| v.content.clone())
                    .unwrap_or_else(|| main_content.clone());
                self.diff_engine
                    .three_way_merge(&main_content, &branch_content, &latest_content)
                    .is_none()
            }
            _ => false,
        };

        Ok(BranchStatusReport {
            branch_id: branch.id.clone(),
            status: branch.status,
            has_conflicts,
            can_merge: branch.status == BranchStatus::Active && !has_conflicts,
        })
    }

    /// Apply conflict resolutions against the file's latest content and
    /// commit the outcome as one new version.
    ///
    /// `accept_theirs` takes the branch's pointed-at content, `accept_yours`
    /// keeps the working text, and `manual` replaces the whole text with the
    /// entry's content. Manual entries without content fail validation
    /// before anything is committed.
    pub fn resolve_conflicts(
        &mut self,
        branch_id: &str,
        entries: &[ResolutionEntry],
        store: &mut VersionStore,
    ) -> Result<Version, BranchError> {
        let branch = self
            .get(branch_id)
            .ok_or_else(|| BranchError::BranchNotFound(branch_id.to_string()))?
            .clone();

        for entry in entries {
            if entry.resolution == ResolutionChoice::Manual && entry.content.is_none() {
                return Err(BranchError::MissingResolutionContent {
                    path: entry.path.clone(),
                });
            }
        }

        let branch_content = pointed_content(store, &branch.version);
        let mut working = store
            .get_latest(&branch.file_id)
            .map(|v| v.content.clone())
            .unwrap_or_default();

        for entry in entries {
            match entry.resolution {
                ResolutionChoice::AcceptTheirs => working = branch_content.clone(),
                ResolutionChoice::AcceptYours => {}
                ResolutionChoice::Manual => {
                    if let Some(content) = &entry.content {
                        working = content.clone();
                    }
                }
            }
            debug!(path = %entry.path, resolution = %entry.resolution, "applied resolution entry");
        }

        let message = format!("Resolve conflicts for branch '{}'", branch.name);
        let version = store.create_version(&branch.file_id, &working, &message, &branch.created_by);
        info!(branch_id, version = %version.label, "committed conflict resolutions");
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    /// Diff the contents two branches point at.
    pub fn compare_branches(
        &self,
        branch_a: &str,
        branch_b: &str,
        store: &VersionStore,
    ) -> Result<VersionDiff, BranchError> {
        let a = self
            .get(branch_a)
            .ok_or_else(|| BranchError::BranchNotFound(branch_a.to_string()))?;
        let b = self
            .get(branch_b)
            .ok_or_else(|| BranchError::BranchNotFound(branch_b.to_string()))?;
        if a.file_id != b.file_id {
            return Err(BranchError::FileMismatch {
                source_branch: a.id.clone(),
                target: b.id.clone(),
            });
        }

        let content_a = pointed_content(store, &a.version);
        let content_b = pointed_content(store, &b.version);
        let hunks = self.diff_engine.compute_diff(&content_a, &content_b);
        Ok(VersionDiff {
            version_a: a.version.clone(),
            version_b: b.version.clone(),
            additions: hunks.iter().map(Hunk::additions).sum(),
            deletions: hunks.iter().map(Hunk::deletions).sum(),
            hunks,
        })
    }

    /// Walk the `parent_id` chain starting at (and including) the branch.
    pub fn branch_history(&self, branch_id: &str) -> Result<Vec<&Branch>, BranchError> {
        let mut history = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = Some(
            self.get(branch_id)
                .ok_or_else(|| BranchError::BranchNotFound(branch_id.to_string()))?,
        );

        while let Some(branch) = current {
            if !seen.insert(branch.id.as_str()) {
                break;
            }
            history.push(branch);
            current = branch.parent_id.as_deref().and_then(|pid| self.get(pid));
        }
        Ok(history)
    }

    /// Rename a branch.
    pub fn rename(&mut self, branch_id: &str, new_name: &str) -> Result<(), BranchError> {
        let &idx = self
            .by_id
            .get(branch_id)
            .ok_or_else(|| BranchError::BranchNotFound(branch_id.to_string()))?;
        if let Some(branch) = self.arena.get_mut(idx).and_then(|slot| slot.as_mut()) {
            debug!(branch_id, from = %branch.name, to = new_name, "renaming branch");
            branch.name = new_name.to_string();
        }
        Ok(())
    }

    /// Delete a merged or abandoned branch.
    pub fn delete(&mut self, branch_id: &str) -> Result<(), BranchError> {
        let branch = self
            .get(branch_id)
            .ok_or_else(|| BranchError::BranchNotFound(branch_id.to_string()))?;
        if branch.status == BranchStatus::Active {
            return Err(BranchError::ActiveBranchProtected(branch_id.to_string()));
        }

        if let Some(&idx) = self.by_id.get(branch_id) {
            if let Some(slot) = self.arena.get_mut(idx) {
                *slot = None;
            }
        }
        self.by_id.remove(branch_id);
        info!(branch_id, "deleted branch");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn set_status(&mut self, branch_id: &str, status: BranchStatus) {
        if let Some(&idx) = self.by_id.get(branch_id) {
            if let Some(branch) = self.arena.get_mut(idx).and_then(|slot| slot.as_mut()) {
                branch.status = status;
            }
        }
    }

    fn set_version(&mut self, branch_id: &str, version_id: &str) {
        if let Some(&idx) = self.by_id.get(branch_id) {
            if let Some(branch) = self.arena.get_mut(idx).and_then(|slot| slot.as_mut()) {
                branch.version = version_id.to_string();
            }
        }
    }
}

/// The content a branch pointer resolves to; placeholder pointers resolve to
/// the empty string.
fn pointed_content(store: &VersionStore, version_id: &str) -> String {
    store
        .get_version(version_id)
        .map(|v| v.content.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResolutionEntry;

    fn setup() -> (BranchManager, VersionStore) {
        let engine = DiffEngine::new();
        (BranchManager::new(engine), VersionStore::new(engine))
    }

    #[test]
    fn test_create_branch_captures_latest_version() {
        let (mut branches, mut store) = setup();
        let v1 = store.create_version("doc", "content", "m", "alice");
        let branch = branches.create_branch("feature", "doc", None, "alice", &store);
        assert_eq!(branch.version, v1.id);
        assert_eq!(branch.status, BranchStatus::Active);
        assert!(branch.parent_id.is_none());
    }

    #[test]
    fn test_create_branch_without_versions_gets_placeholder() {
        let (mut branches, store) = setup();
        let branch = branches.create_branch("feature", "doc", None, "alice", &store);
        assert!(store.get_version(&branch.version).is_none());
    }

    #[test]
    fn test_merge_identical_branches_succeeds() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "line1\nline2", "m", "alice");
        let main = branches.create_branch("main", "doc", None, "alice", &store);
        let feature = branches.create_branch("feature", "doc", Some(&main.id), "bob", &store);

        let merged = branches.merge(&feature.id, &main.id, &mut store).unwrap();
        assert_eq!(merged.content, "line1\nline2");
        assert_eq!(
            branches.get(&feature.id).unwrap().status,
            BranchStatus::Merged
        );
        // Target now points at the merge version.
        assert_eq!(branches.get(&main.id).unwrap().version, merged.id);
    }

    #[test]
    fn test_merge_combines_non_overlapping_edits() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "line1\nline2\nline3", "m", "alice");
        let main = branches.create_branch("main", "doc", None, "alice", &store);
        // Feature branch carries an edit to line 2.
        store.create_version("doc", "line1\nline2-feature\nline3", "m", "bob");
        let feature = branches.create_branch("feature", "doc", Some(&main.id), "bob", &store);
        // The file moves on with an edit to line 3.
        store.create_version("doc", "line1\nline2\nline3-mainline", "m", "carol");

        let merged = branches.merge(&feature.id, &main.id, &mut store).unwrap();
        assert!(merged.content.contains("line2-feature"));
        assert!(merged.content.contains("line3-mainline"));
    }

    #[test]
    fn test_merge_conflict_abandons_source() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "line1\nline2\nline3", "m", "alice");
        let main = branches.create_branch("main", "doc", None, "alice", &store);
        // Feature branch edits line 2 one way...
        store.create_version("doc", "line1\nline2-version-a\nline3", "m", "bob");
        let feature = branches.create_branch("feature", "doc", Some(&main.id), "bob", &store);
        // ...and the file's latest edits the same line the other way.
        store.create_version("doc", "line1\nline2-version-b\nline3", "m", "carol");

        let err = branches.merge(&feature.id, &main.id, &mut store).unwrap_err();
        assert!(matches!(err, BranchError::MergeConflict { .. }));
        // The side effect on the failing path: source is abandoned.
        assert_eq!(
            branches.get(&feature.id).unwrap().status,
            BranchStatus::Abandoned
        );
        assert_eq!(branches.get(&main.id).unwrap().status, BranchStatus::Active);
    }

    #[test]
    fn test_merge_rejects_unknown_and_cross_file_branches() {
        let (mut branches, mut store) = setup();
        store.create_version("doc-1", "a", "m", "alice");
        store.create_version("doc-2", "b", "m", "alice");
        let b1 = branches.create_branch("main", "doc-1", None, "alice", &store);
        let b2 = branches.create_branch("main", "doc-2", None, "alice", &store);

        let err = branches.merge("missing", &b1.id, &mut store).unwrap_err();
        assert!(matches!(err, BranchError::BranchNotFound(_)));

        let err = branches.merge(&b1.id, &b2.id, &mut store).unwrap_err();
        assert!(matches!(err, BranchError::FileMismatch { .. }));
    }

    #[test]
    fn test_merge_rejects_non_active_branches() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "a", "m", "alice");
        let main = branches.create_branch("main", "doc", None, "alice", &store);
        let feature = branches.create_branch("feature", "doc", None, "bob", &store);
        branches.abandon(&feature.id).unwrap();

        let err = branches.merge(&feature.id, &main.id, &mut store).unwrap_err();
        assert!(matches!(err, BranchError::NotActive { .. }));
    }

    #[test]
    fn test_abandon_is_idempotent() {
        let (mut branches, store) = setup();
        let branch = branches.create_branch("feature", "doc", None, "alice", &store);
        branches.abandon(&branch.id).unwrap();
        branches.abandon(&branch.id).unwrap();
        assert_eq!(
            branches.get(&branch.id).unwrap().status,
            BranchStatus::Abandoned
        );
        assert!(matches!(
            branches.abandon("missing"),
            Err(BranchError::BranchNotFound(_))
        ));
    }

    #[test]
    fn test_branch_status_reports_mergeability() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "line1\nline2", "m", "alice");
        branches.create_branch("main", "doc", None, "alice", &store);
        let feature = branches.create_branch("feature", "doc", None, "bob", &store);

        let report = branches.branch_status(&feature.id, &store).unwrap();
        assert_eq!(report.status, BranchStatus::Active);
        assert!(!report.has_conflicts);
        assert!(report.can_merge);
    }

    #[test]
    fn test_branch_status_detects_trial_merge_conflict() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "line1\nline2", "m", "alice");
        branches.create_branch("main", "doc", None, "alice", &store);
        store.create_version("doc", "line1\nline2-a", "m", "bob");
        let feature = branches.create_branch("feature", "doc", None, "bob", &store);
        store.create_version("doc", "line1\nline2-b", "m", "carol");

        let report = branches.branch_status(&feature.id, &store).unwrap();
        assert!(report.has_conflicts);
        assert!(!report.can_merge);
        // The trial committed nothing and changed no status.
        assert_eq!(
            branches.get(&feature.id).unwrap().status,
            BranchStatus::Active
        );
        assert_eq!(store.get_history("doc").len(), 3);
    }

    #[test]
    fn test_resolve_conflicts_accept_theirs() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "branch text", "m", "alice");
        let feature = branches.create_branch("feature", "doc", None, "bob", &store);
        store.create_version("doc", "latest text", "m", "carol");

        let entries = vec![ResolutionEntry {
            path: "doc".into(),
            resolution: ResolutionChoice::AcceptTheirs,
            content: None,
        }];
        let version = branches
            .resolve_conflicts(&feature.id, &entries, &mut store)
            .unwrap();
        assert_eq!(version.content, "branch text");
        assert_eq!(version.message, "Resolve conflicts for branch 'feature'");
    }

    #[test]
    fn test_resolve_conflicts_manual_replaces_wholesale() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "old", "m", "alice");
        let feature = branches.create_branch("feature", "doc", None, "bob", &store);

        let entries = vec![ResolutionEntry {
            path: "doc".into(),
            resolution: ResolutionChoice::Manual,
            content: Some("hand-merged".into()),
        }];
        let version = branches
            .resolve_conflicts(&feature.id, &entries, &mut store)
            .unwrap();
        assert_eq!(version.content, "hand-merged");
    }

    #[test]
    fn test_resolve_conflicts_manual_without_content_fails_before_commit() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "old", "m", "alice");
        let feature = branches.create_branch("feature", "doc", None, "bob", &store);

        let entries = vec![ResolutionEntry {
            path: "doc".into(),
            resolution: ResolutionChoice::Manual,
            content: None,
        }];
        let err = branches
            .resolve_conflicts(&feature.id, &entries, &mut store)
            .unwrap_err();
        assert!(matches!(err, BranchError::MissingResolutionContent { .. }));
        // All-or-nothing: no version was committed.
        assert_eq!(store.get_history("doc").len(), 1);
    }

    #[test]
    fn test_compare_branches() {
        let (mut branches, mut store) = setup();
        store.create_version("doc", "line1\nline2", "m", "alice");
        let main = branches.create_branch("main", "doc", None, "alice", &store);
        store.create_version("doc", "line1\nline2-changed", "m", "bob");
        let feature = branches.create_branch("feature", "doc", None, "bob", &store);

        let diff = branches.compare_branches(&main.id, &feature.id, &store).unwrap();
        assert_eq!(diff.additions, 1);
        assert_eq!(diff.deletions, 1);
    }

    #[test]
    fn test_branch_history_walks_parents() {
        let (mut branches, store) = setup();
        let root = branches.create_branch("main", "doc", None, "alice", &store);
        let child = branches.create_branch("feature", "doc", Some(&root.id), "bob", &store);
        let grandchild =
            branches.create_branch("tweak", "doc", Some(&child.id), "carol", &store);

        let history = branches.branch_history(&grandchild.id).unwrap();
        let names: Vec<&str> = history.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["tweak", "feature", "main"]);
    }

    #[test]
    fn test_rename_and_get_by_name() {
        let (mut branches, store) = setup();
        let branch = branches.create_branch("feature", "doc", None, "alice", &store);
        branches.rename(&branch.id, "feature-2").unwrap();
        assert!(branches.get_by_name("doc", "feature").is_none());
        assert_eq!(
            branches.get_by_name("doc", "feature-2").unwrap().id,
            branch.id
        );
    }

    #[test]
    fn test_delete_requires_non_active_status() {
        let (mut branches, store) = setup();
        let branch = branches.create_branch("feature", "doc", None, "alice", &store);
        let err = branches.delete(&branch.id).unwrap_err();
        assert!(matches!(err, BranchError::ActiveBranchProtected(_)));

        branches.abandon(&branch.id).unwrap();
        branches.delete(&branch.id).unwrap();
        assert!(branches.get(&branch.id).is_none());
    }
}
