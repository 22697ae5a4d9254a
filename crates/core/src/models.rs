//! Domain model types used throughout the CollabDoc core.
//!
//! These types bridge the version store, branch manager, and any host
//! embedding the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// An immutable, labeled full-content snapshot of a file.
///
/// Versions form a singly linked chain per file via [`Version::parent_version`].
/// Content never mutates after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    /// Unique version id.
    pub id: String,
    /// The file this version belongs to (opaque id, never validated).
    pub file_id: String,
    /// Monotonic label of the form `vN.0.0`.
    pub label: String,
    /// Full text snapshot.
    pub content: String,
    /// Who created the version (opaque id).
    pub author: String,
    /// Commit message.
    pub message: String,
    /// Id of the previous current version, if any.
    pub parent_version: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Aggregate statistics over a file's version chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionStats {
    /// Number of live versions.
    pub version_count: usize,
    /// Cumulative content size in bytes across all versions.
    pub total_size: usize,
    /// Distinct authors, in first-seen order.
    pub authors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// Lifecycle status of a branch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    /// Open for work; the only status that can merge or be abandoned.
    Active,
    /// Successfully merged as the source of a merge.
    Merged,
    /// Explicitly abandoned, or abandoned implicitly on a merge conflict.
    Abandoned,
}

impl std::fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Merged => write!(f, "merged"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// A named, mutable pointer to a version snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Unique branch id.
    pub id: String,
    /// Branch name, unique per file by convention (not enforced).
    pub name: String,
    /// The file this branch tracks.
    pub file_id: String,
    /// Fork origin, if this branch was created from another branch.
    pub parent_id: Option<String>,
    /// Id of the version snapshot the branch currently points to.
    pub version: String,
    /// Who created the branch.
    pub created_by: String,
    /// Current lifecycle status.
    pub status: BranchStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A report on whether a branch can merge cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchStatusReport {
    pub branch_id: String,
    pub status: BranchStatus,
    /// Whether a trial merge against the file's "main" branch found conflicts.
    pub has_conflicts: bool,
    /// `status == active && !has_conflicts`.
    pub can_merge: bool,
}

/// The strategy chosen for one conflict-resolution entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionChoice {
    /// Take the branch's content.
    AcceptTheirs,
    /// Keep the file's current content.
    AcceptYours,
    /// Replace the text wholesale with caller-supplied content.
    Manual,
}

impl std::fmt::Display for ResolutionChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptTheirs => write!(f, "accept_theirs"),
            Self::AcceptYours => write!(f, "accept_yours"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// One entry submitted to `BranchManager::resolve_conflicts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionEntry {
    /// The path (opaque label) the entry applies to.
    pub path: String,
    /// The chosen strategy.
    pub resolution: ResolutionChoice,
    /// Replacement content; required when `resolution` is `Manual`.
    pub content: Option<String>,
}

// ---------------------------------------------------------------------------
// Audit record
// ---------------------------------------------------------------------------

/// An audit record handed to the host's audit sink.
///
/// Delivery is best-effort; a failing sink never fails the primary
/// operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub user_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub workspace_id: Option<String>,
    pub success: bool,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a success record with empty metadata.
    pub fn success(user_id: &str, action: &str, resource_type: &str, resource_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            workspace_id: None,
            success: true,
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Create a failure record with empty metadata.
    pub fn failure(user_id: &str, action: &str, resource_type: &str, resource_id: &str) -> Self {
        Self {
            success: false,
            ..Self::success(user_id, action, resource_type, resource_id)
        }
    }

    /// Attach a workspace id.
    pub fn in_workspace(mut self, workspace_id: Option<&str>) -> Self {
        self.workspace_id = workspace_id.map(str::to_string);
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_status_display() {
        assert_eq!(BranchStatus::Active.to_string(), "active");
        assert_eq!(BranchStatus::Merged.to_string(), "merged");
        assert_eq!(BranchStatus::Abandoned.to_string(), "abandoned");
    }

    #[test]
    fn test_branch_status_serde_snake_case() {
        let json = serde_json::to_string(&BranchStatus::Abandoned).unwrap();
        assert_eq!(json, "\"abandoned\"");
        let back: BranchStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(back, BranchStatus::Active);
    }

    #[test]
    fn test_audit_record_builders() {
        let rec = AuditRecord::failure("u1", "merge_branch", "branch", "b1")
            .in_workspace(Some("ws1"))
            .with_metadata(serde_json::json!({"target": "main"}));
        assert!(!rec.success);
        assert_eq!(rec.workspace_id.as_deref(), Some("ws1"));
        assert_eq!(rec.metadata["target"], "main");
    }
}
