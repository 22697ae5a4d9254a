//! Conflict resolution over detected operation conflicts.
//!
//! The [`ConflictResolver`] owns every conflict it has detected (arena plus
//! id table) until the caller clears them in bulk. Resolution marks the
//! record resolved and hands back the operation that should win.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConflictError;
use crate::ot::{self, EditorOperation, OpKind};

use super::detector::{Conflict, ConflictDetector, ConflictType, ResolutionStrategy};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A conflict enriched with side-by-side previews against a base text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedConflict {
    pub conflict: Conflict,
    /// The base with only the first operation applied.
    pub preview_theirs: String,
    /// The base with only the second operation applied.
    pub preview_yours: String,
    /// The merge-heuristic result, when the pair supports it.
    pub merge_preview: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Detects and resolves conflicts among concurrent operations.
#[derive(Default)]
pub struct ConflictResolver {
    arena: Vec<Option<Conflict>>,
    by_id: HashMap<String, usize>,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect conflicts across `operations`, record them, and return copies.
    pub fn detect_conflicts(&mut self, operations: &[EditorOperation]) -> Vec<Conflict> {
        let conflicts = ConflictDetector::detect(operations);
        for conflict in &conflicts {
            let idx = self.arena.len();
            self.by_id.insert(conflict.id.clone(), idx);
            self.arena.push(Some(conflict.clone()));
        }
        conflicts
    }

    /// Look up a conflict by id.
    pub fn get(&self, conflict_id: &str) -> Option<&Conflict> {
        self.by_id
            .get(conflict_id)
            .and_then(|&idx| self.arena.get(idx))
            .and_then(|slot| slot.as_ref())
    }

    /// All conflicts still awaiting resolution.
    pub fn unresolved(&self) -> Vec<&Conflict> {
        self.arena
            .iter()
            .filter_map(|slot| slot.as_ref())
            .filter(|c| !c.resolved)
            .collect()
    }

    /// Number of tracked conflicts.
    pub fn len(&self) -> usize {
        self.arena.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every tracked conflict.
    pub fn clear(&mut self) {
        debug!(count = self.len(), "clearing conflicts");
        self.arena.clear();
        self.by_id.clear();
    }

    /// Automatically resolve a conflict.
    ///
    /// A concurrent edit between two inserts merges their content in
    /// timestamp order. Every other case resolves to `accept_theirs`, which
    /// returns `operations[0]` — the positionally-first operation, whichever
    /// side happens to be the delete.
    pub fn resolve(&mut self, conflict_id: &str) -> Result<EditorOperation, ConflictError> {
        let conflict = self.get_for_update(conflict_id)?;

        let (strategy, winner) = match (&conflict.conflict_type, merged_insert(&conflict.operations))
        {
            (ConflictType::ConcurrentEdit, Some(merged)) => (ResolutionStrategy::Merge, merged),
            _ => (
                ResolutionStrategy::AcceptTheirs,
                conflict.operations[0].clone(),
            ),
        };

        conflict.resolved = true;
        conflict.resolution = Some(strategy);
        info!(conflict_id, strategy = %strategy, "conflict auto-resolved");
        Ok(winner)
    }

    /// Resolve a conflict with an explicit strategy.
    ///
    /// Returns `Ok(None)` when the strategy does not apply: `merge` on a
    /// pair that is not insert/insert, or `manual` without content.
    pub fn manual_resolve(
        &mut self,
        conflict_id: &str,
        strategy: ResolutionStrategy,
        custom_content: Option<&str>,
    ) -> Result<Option<EditorOperation>, ConflictError> {
        let conflict = self.get_for_update(conflict_id)?;

        let winner = match strategy {
            ResolutionStrategy::AcceptTheirs => Some(conflict.operations[0].clone()),
            ResolutionStrategy::AcceptYours => Some(conflict.operations[1].clone()),
            ResolutionStrategy::Merge => merged_insert(&conflict.operations),
            ResolutionStrategy::Manual => custom_content.map(|content| {
                let template = &conflict.operations[0];
                EditorOperation {
                    kind: OpKind::Insert {
                        content: content.to_string(),
                    },
                    position: conflict.position,
                    user_id: template.user_id.clone(),
                    timestamp: template.timestamp,
                    version: template.version,
                }
            }),
        };

        let Some(winner) = winner else {
            return Ok(None);
        };
        conflict.resolved = true;
        conflict.resolution = Some(strategy);
        info!(conflict_id, strategy = %strategy, "conflict manually resolved");
        Ok(Some(winner))
    }

    /// A conflict with previews of each side applied to `base_content`.
    ///
    /// Each preview applies the raw, untransformed operation independently.
    pub fn extended_conflict(
        &self,
        conflict_id: &str,
        base_content: &str,
    ) -> Result<ExtendedConflict, ConflictError> {
        let conflict = self
            .get(conflict_id)
            .ok_or_else(|| ConflictError::NotFound(conflict_id.to_string()))?;

        let merge_preview =
            merged_insert(&conflict.operations).map(|op| ot::apply(base_content, &op));

        Ok(ExtendedConflict {
            conflict: conflict.clone(),
            preview_theirs: ot::apply(base_content, &conflict.operations[0]),
            preview_yours: ot::apply(base_content, &conflict.operations[1]),
            merge_preview,
        })
    }

    fn get_for_update(&mut self, conflict_id: &str) -> Result<&mut Conflict, ConflictError> {
        let &idx = self
            .by_id
            .get(conflict_id)
            .ok_or_else(|| ConflictError::NotFound(conflict_id.to_string()))?;
        let conflict = self
            .arena
            .get_mut(idx)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| ConflictError::NotFound(conflict_id.to_string()))?;
        if conflict.resolved {
            return Err(ConflictError::AlreadyResolved(conflict_id.to_string()));
        }
        Ok(conflict)
    }
}

/// Merge two inserts by concatenating their content in ascending timestamp
/// order, as a synthetic insert at the earlier position.
///
/// Returns `None` unless both operations are inserts.
fn merged_insert(operations: &[EditorOperation; 2]) -> Option<EditorOperation> {
    let (OpKind::Insert { content: content_a }, OpKind::Insert { content: content_b }) =
        (&operations[0].kind, &operations[1].kind)
    else {
        return None;
    };

    let (earlier, earlier_content, later_content) =
        if operations[0].timestamp <= operations[1].timestamp {
            (&operations[0], content_a, content_b)
        } else {
            (&operations[1], content_b, content_a)
        };

    Some(EditorOperation {
        kind: OpKind::Insert {
            content: format!("{earlier_content}{later_content}"),
        },
        position: operations[0].position.min(operations[1].position),
        user_id: earlier.user_id.clone(),
        timestamp: earlier.timestamp,
        version: earlier.version,
    })
}
