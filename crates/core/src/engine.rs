//! The CollabDoc engine.
//!
//! [`CollabEngine`] wires the managers together with their collaborators
//! injected at construction, and offers orchestration entry points that
//! combine a state change with broadcast fan-out and best-effort audit
//! records:
//!
//! 1. Commit or revert file snapshots through the version store.
//! 2. Create and merge branches.
//! 3. Feed live editor operations through conflict detection and apply
//!    them to a document.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::audit::{record_best_effort, AuditSink, NullAuditSink};
use crate::branch::BranchManager;
use crate::broadcast::{BroadcastMessage, Broadcaster, NullBroadcaster};
use crate::config::CoreConfig;
use crate::conflict::{Conflict, ConflictResolver};
use crate::diff::DiffEngine;
use crate::errors::{BranchError, CoreError};
use crate::models::{AuditRecord, Branch, ResolutionEntry, Version};
use crate::ot::{self, EditorOperation};
use crate::versions::VersionStore;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Running totals across the engine's lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub versions_created: usize,
    pub branches_created: usize,
    pub merges_completed: usize,
    pub merges_conflicted: usize,
    pub operations_applied: usize,
    pub operation_conflicts: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The assembled core: one of each manager plus the host collaborators.
pub struct CollabEngine {
    config: CoreConfig,
    versions: VersionStore,
    branches: BranchManager,
    resolver: ConflictResolver,
    broadcaster: Arc<dyn Broadcaster>,
    audit: Arc<dyn AuditSink>,
    stats: EngineStats,
}

impl CollabEngine {
    /// Assemble an engine with explicit collaborators.
    pub fn new(
        config: CoreConfig,
        broadcaster: Arc<dyn Broadcaster>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let diff_engine = DiffEngine::from_config(&config.diff);
        info!(context_lines = config.diff.context_lines, "initializing engine");
        Self {
            config,
            versions: VersionStore::new(diff_engine),
            branches: BranchManager::new(diff_engine),
            resolver: ConflictResolver::new(),
            broadcaster,
            audit,
            stats: EngineStats::default(),
        }
    }

    /// Convenience engine with default config and null collaborators.
    pub fn with_defaults() -> Self {
        Self::new(
            CoreConfig::default(),
            Arc::new(NullBroadcaster),
            Arc::new(NullAuditSink),
        )
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn versions_mut(&mut self) -> &mut VersionStore {
        &mut self.versions
    }

    pub fn branches(&self) -> &BranchManager {
        &self.branches
    }

    pub fn branches_mut(&mut self) -> &mut BranchManager {
        &mut self.branches
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut ConflictResolver {
        &mut self.resolver
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    // -----------------------------------------------------------------------
    // Versions
    // -----------------------------------------------------------------------

    /// Snapshot `content` as the file's new current version.
    pub fn commit(&mut self, file_id: &str, content: &str, message: &str, author: &str) -> Version {
        let version = self.versions.create_version(file_id, content, message, author);
        self.stats.versions_created += 1;

        self.audit_success(author, "create_version", "version", &version.id);
        self.broadcaster.broadcast(
            &BroadcastMessage::new(
                "version_created",
                json!({
                    "file_id": file_id,
                    "version_id": version.id,
                    "label": version.label,
                }),
            ),
            Some(author),
        );
        version
    }

    /// Revert a file to an earlier version by committing a fresh snapshot.
    pub fn revert(
        &mut self,
        file_id: &str,
        version_id: &str,
        author: &str,
    ) -> Result<Version, CoreError> {
        let version = self.versions.revert(file_id, version_id, author)?;
        self.stats.versions_created += 1;

        self.audit_success(author, "revert_version", "version", &version.id);
        self.broadcaster.broadcast(
            &BroadcastMessage::new(
                "version_reverted",
                json!({
                    "file_id": file_id,
                    "reverted_to": version_id,
                    "version_id": version.id,
                }),
            ),
            Some(author),
        );
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Create an active branch on a file.
    pub fn create_branch(
        &mut self,
        name: &str,
        file_id: &str,
        parent_id: Option<&str>,
        created_by: &str,
    ) -> Branch {
        let branch = self
            .branches
            .create_branch(name, file_id, parent_id, created_by, &self.versions);
        self.stats.branches_created += 1;

        self.audit_success(created_by, "create_branch", "branch", &branch.id);
        self.broadcaster.broadcast(
            &BroadcastMessage::new(
                "branch_created",
                json!({"file_id": file_id, "branch_id": branch.id, "name": name}),
            ),
            Some(created_by),
        );
        branch
    }

    /// Merge a source branch into a target branch.
    ///
    /// A conflicted merge abandons the source (that side effect belongs to
    /// the failing path), audits the failure, and returns the error.
    pub fn merge_branches(
        &mut self,
        source_id: &str,
        target_id: &str,
    ) -> Result<Version, CoreError> {
        let actor = self
            .branches
            .get(source_id)
            .map(|b| b.created_by.clone())
            .unwrap_or_default();

        match self.branches.merge(source_id, target_id, &mut self.versions) {
            Ok(version) => {
                self.stats.merges_completed += 1;
                self.audit_success(&actor, "merge_branch", "branch", source_id);
                self.broadcaster.broadcast(
                    &BroadcastMessage::new(
                        "branch_merged",
                        json!({
                            "source_id": source_id,
                            "target_id": target_id,
                            "version_id": version.id,
                        }),
                    ),
                    None,
                );
                Ok(version)
            }
            Err(err @ BranchError::MergeConflict { .. }) => {
                self.stats.merges_conflicted += 1;
                record_best_effort(
                    self.audit.as_ref(),
                    AuditRecord::failure(&actor, "merge_branch", "branch", source_id)
                        .in_workspace(self.config.workspace_id.as_deref())
                        .with_metadata(json!({"target_id": target_id})),
                );
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Apply conflict resolutions for a branch and commit the outcome.
    pub fn resolve_branch_conflicts(
        &mut self,
        branch_id: &str,
        entries: &[ResolutionEntry],
    ) -> Result<Version, CoreError> {
        let actor = self
            .branches
            .get(branch_id)
            .map(|b| b.created_by.clone())
            .unwrap_or_default();
        let version = self
            .branches
            .resolve_conflicts(branch_id, entries, &mut self.versions)?;
        self.stats.versions_created += 1;

        self.audit_success(&actor, "resolve_branch_conflicts", "branch", branch_id);
        self.broadcaster.broadcast(
            &BroadcastMessage::new(
                "branch_conflicts_resolved",
                json!({"branch_id": branch_id, "version_id": version.id}),
            ),
            None,
        );
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Live operations
    // -----------------------------------------------------------------------

    /// Run one editor operation through validation and conflict detection,
    /// applying it to `document` only when no conflict with `concurrent`
    /// operations is found.
    ///
    /// Returns the (possibly unchanged) document and the conflicts recorded
    /// for later resolution. The operation is broadcast to everyone but its
    /// author only when it applied.
    pub fn submit_operation(
        &mut self,
        document: &str,
        op: &EditorOperation,
        concurrent: &[EditorOperation],
    ) -> Result<(String, Vec<Conflict>), CoreError> {
        ot::validate(op, document.chars().count())?;

        let mut batch: Vec<EditorOperation> = concurrent.to_vec();
        batch.push(op.clone());
        let conflicts = self.resolver.detect_conflicts(&batch);

        if !conflicts.is_empty() {
            self.stats.operation_conflicts += conflicts.len();
            debug!(
                count = conflicts.len(),
                user = %op.user_id,
                "operation held back pending conflict resolution"
            );
            return Ok((document.to_string(), conflicts));
        }

        let updated = ot::apply(document, op);
        self.stats.operations_applied += 1;

        self.audit_success(&op.user_id, "apply_operation", "operation", &op.to_string());
        self.broadcaster.broadcast(
            &BroadcastMessage::new(
                "operation_applied",
                json!({
                    "user_id": op.user_id,
                    "position": op.position,
                    "delta": op.op_length(),
                }),
            ),
            Some(&op.user_id),
        );
        Ok((updated, conflicts))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn audit_success(&self, user_id: &str, action: &str, resource_type: &str, resource_id: &str) {
        record_best_effort(
            self.audit.as_ref(),
            AuditRecord::success(user_id, action, resource_type, resource_id)
                .in_workspace(self.config.workspace_id.as_deref()),
        );
    }
}
