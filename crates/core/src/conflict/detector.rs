//! Pairwise conflict detection over concurrent editor operations.
//!
//! Detection is O(n^2) across the submitted operation set. Pairs authored
//! by the same user never conflict with themselves and are skipped.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ot::{EditorOperation, OpKind};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Categorisation of a conflict between two concurrent operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Both operations edit the same spot (or their delete ranges overlap).
    ConcurrentEdit,
    /// The first operation deletes where the second edits.
    DeleteEdit,
    /// The first operation edits where the second deletes.
    EditDelete,
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConcurrentEdit => write!(f, "concurrent_edit"),
            Self::DeleteEdit => write!(f, "delete_edit"),
            Self::EditDelete => write!(f, "edit_delete"),
        }
    }
}

/// The strategy a conflict was (or is to be) resolved with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Keep the first operation.
    AcceptTheirs,
    /// Keep the second operation.
    AcceptYours,
    /// Concatenate both inserts in timestamp order.
    Merge,
    /// Caller-supplied replacement content.
    Manual,
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptTheirs => write!(f, "accept_theirs"),
            Self::AcceptYours => write!(f, "accept_yours"),
            Self::Merge => write!(f, "merge"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A detected conflict between two concurrent operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique conflict id.
    pub id: String,
    /// The classification.
    pub conflict_type: ConflictType,
    /// Character position where the operations collide.
    pub position: usize,
    /// The two operations, in detection order.
    pub operations: [EditorOperation; 2],
    /// Whether the conflict has been resolved.
    pub resolved: bool,
    /// The strategy chosen, once resolved.
    pub resolution: Option<ResolutionStrategy>,
}

impl Conflict {
    fn new(conflict_type: ConflictType, position: usize, ops: [EditorOperation; 2]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conflict_type,
            position,
            operations: ops,
            resolved: false,
            resolution: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Stateless pairwise detector over a set of concurrent operations.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Compare every cross-user pair and return the detected conflicts.
    pub fn detect(operations: &[EditorOperation]) -> Vec<Conflict> {
        info!(count = operations.len(), "detecting operation conflicts");

        let mut conflicts = Vec::new();
        for i in 0..operations.len() {
            for j in (i + 1)..operations.len() {
                let a = &operations[i];
                let b = &operations[j];
                if a.user_id == b.user_id {
                    continue;
                }
                if let Some((conflict_type, position)) = classify(a, b) {
                    debug!(
                        conflict_type = %conflict_type,
                        position,
                        user_a = %a.user_id,
                        user_b = %b.user_id,
                        "conflict detected"
                    );
                    conflicts.push(Conflict::new(
                        conflict_type,
                        position,
                        [a.clone(), b.clone()],
                    ));
                }
            }
        }

        info!(count = conflicts.len(), "conflict detection complete");
        conflicts
    }
}

/// Classify a single operation pair, in argument order.
fn classify(a: &EditorOperation, b: &EditorOperation) -> Option<(ConflictType, usize)> {
    // Same position: concurrent unless exactly one side deletes.
    if a.position == b.position {
        if !a.is_delete() && !b.is_delete() {
            return Some((ConflictType::ConcurrentEdit, a.position));
        }
        if a.is_delete() && b.is_insert() {
            return Some((ConflictType::DeleteEdit, a.position));
        }
        if a.is_insert() && b.is_delete() {
            return Some((ConflictType::EditDelete, a.position));
        }
    }

    // Two deletes with overlapping [position, position + length) ranges.
    if let (OpKind::Delete { length: len_a }, OpKind::Delete { length: len_b }) =
        (&a.kind, &b.kind)
    {
        let (start_a, end_a) = (a.position, a.position + len_a);
        let (start_b, end_b) = (b.position, b.position + len_b);
        if start_a < end_b && start_b < end_a {
            return Some((ConflictType::ConcurrentEdit, start_a.max(start_b)));
        }
    }

    // An insert strictly inside the other operation's delete range.
    if a.is_delete() && b.is_insert() && inside_delete(b.position, a) {
        return Some((ConflictType::DeleteEdit, b.position));
    }
    if a.is_insert() && b.is_delete() && inside_delete(a.position, b) {
        return Some((ConflictType::EditDelete, a.position));
    }

    None
}

fn inside_delete(position: usize, delete: &EditorOperation) -> bool {
    match delete.kind {
        OpKind::Delete { length } => {
            delete.position < position && position < delete.position + length
        }
        _ => false,
    }
}
