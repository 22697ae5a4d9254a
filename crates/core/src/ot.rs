//! Operational transform over live document edits.
//!
//! Operations are atomic inserts/deletes/retains at character offsets. The
//! variant per kind keeps invalid field combinations (a delete with content,
//! an insert with a length) unrepresentable. All offsets count Unicode
//! scalar values, never bytes.

use serde::{Deserialize, Serialize};

use crate::errors::OperationError;

// ---------------------------------------------------------------------------
// Operation model
// ---------------------------------------------------------------------------

/// Payload of an editor operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum OpKind {
    /// Insert `content` at the operation position.
    Insert { content: String },
    /// Delete `length` characters starting at the operation position.
    Delete { length: usize },
    /// No-op placeholder holding a position.
    Retain,
}

/// One atomic edit produced by an editor client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditorOperation {
    #[serde(flatten)]
    pub kind: OpKind,
    /// 0-based character offset the operation applies at.
    pub position: usize,
    /// Authoring user (opaque id).
    pub user_id: String,
    /// Client timestamp, milliseconds.
    pub timestamp: i64,
    /// Client sequence number.
    pub version: u64,
}

impl EditorOperation {
    /// Convenience constructor for an insert.
    pub fn insert(position: usize, content: &str, user_id: &str, timestamp: i64) -> Self {
        Self {
            kind: OpKind::Insert {
                content: content.to_string(),
            },
            position,
            user_id: user_id.to_string(),
            timestamp,
            version: 0,
        }
    }

    /// Convenience constructor for a delete.
    pub fn delete(position: usize, length: usize, user_id: &str, timestamp: i64) -> Self {
        Self {
            kind: OpKind::Delete { length },
            position,
            user_id: user_id.to_string(),
            timestamp,
            version: 0,
        }
    }

    /// Convenience constructor for a retain.
    pub fn retain(position: usize, user_id: &str, timestamp: i64) -> Self {
        Self {
            kind: OpKind::Retain,
            position,
            user_id: user_id.to_string(),
            timestamp,
            version: 0,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self.kind, OpKind::Insert { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.kind, OpKind::Delete { .. })
    }

    /// Signed length delta the operation applies to a document:
    /// `+chars(content)` for inserts, `-length` for deletes, 0 for retains.
    pub fn op_length(&self) -> i64 {
        match &self.kind {
            OpKind::Insert { content } => content.chars().count() as i64,
            OpKind::Delete { length } => -(*length as i64),
            OpKind::Retain => 0,
        }
    }
}

impl std::fmt::Display for EditorOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            OpKind::Insert { content } => {
                write!(
                    f,
                    "insert({:?} @ {} by {})",
                    content, self.position, self.user_id
                )
            }
            OpKind::Delete { length } => {
                write!(f, "delete({} @ {} by {})", length, self.position, self.user_id)
            }
            OpKind::Retain => write!(f, "retain(@ {} by {})", self.position, self.user_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Algebra
// ---------------------------------------------------------------------------

/// Apply an operation to a document, clamping out-of-range positions.
///
/// Inserts clamp into `[0, len]`; deletes clamp into `[0, len)` and remove
/// at most the remaining characters, so a delete running past the end is a
/// no-op for the excess.
pub fn apply(document: &str, op: &EditorOperation) -> String {
    let chars: Vec<char> = document.chars().collect();
    match &op.kind {
        OpKind::Insert { content } => {
            let at = op.position.min(chars.len());
            let mut out: String = chars[..at].iter().collect();
            out.push_str(content);
            out.extend(&chars[at..]);
            out
        }
        OpKind::Delete { length } => {
            if chars.is_empty() {
                return String::new();
            }
            let at = op.position.min(chars.len().saturating_sub(1));
            let end = at.saturating_add(*length).min(chars.len());
            let mut out: String = chars[..at].iter().collect();
            out.extend(&chars[end..]);
            out
        }
        OpKind::Retain => document.to_string(),
    }
}

/// Transform two concurrent operations against each other.
///
/// Returns `(a', b')` where `a'` is `a` adjusted for `b` having been
/// applied first and vice versa. An insert at a strictly smaller position
/// shifts the other operation right by its content length; a delete at a
/// strictly smaller position shifts it left (floored at zero).
/// Equal-position inserts are left untouched; ordering that ambiguity is
/// the conflict resolver's job.
pub fn transform_pair(
    op_a: &EditorOperation,
    op_b: &EditorOperation,
) -> (EditorOperation, EditorOperation) {
    (transform_against(op_a, op_b), transform_against(op_b, op_a))
}

fn transform_against(op: &EditorOperation, against: &EditorOperation) -> EditorOperation {
    let mut transformed = op.clone();
    if against.position < op.position {
        match &against.kind {
            OpKind::Insert { content } => {
                transformed.position += content.chars().count();
            }
            OpKind::Delete { length } => {
                transformed.position = transformed.position.saturating_sub(*length);
            }
            OpKind::Retain => {}
        }
    }
    transformed
}

/// Rebase a sequence of historical operations against one reference
/// operation, pairwise.
pub fn transform_path(
    history: &[EditorOperation],
    reference: &EditorOperation,
) -> Vec<EditorOperation> {
    history
        .iter()
        .map(|op| transform_against(op, reference))
        .collect()
}

/// Compose two operations.
///
/// True composition is out of scope; the pair is returned unmerged, in
/// application order.
pub fn compose(op_a: &EditorOperation, op_b: &EditorOperation) -> Vec<EditorOperation> {
    vec![op_a.clone(), op_b.clone()]
}

/// Invert an operation against the document it was applied to.
///
/// An insert inverts to a delete of the same length at the same position; a
/// delete inverts to an insert of exactly the removed slice of
/// `document_before`; a retain inverts to itself.
pub fn invert(op: &EditorOperation, document_before: &str) -> EditorOperation {
    let mut inverted = op.clone();
    inverted.kind = match &op.kind {
        OpKind::Insert { content } => OpKind::Delete {
            length: content.chars().count(),
        },
        OpKind::Delete { length } => {
            let chars: Vec<char> = document_before.chars().collect();
            let at = op.position.min(chars.len());
            let end = at.saturating_add(*length).min(chars.len());
            OpKind::Insert {
                content: chars[at..end].iter().collect(),
            }
        }
        OpKind::Retain => OpKind::Retain,
    };
    inverted
}

/// Validate an operation against a document length.
///
/// The position must lie in `[0, len]`, and a delete's whole range must fit
/// within the document.
pub fn validate(op: &EditorOperation, document_len: usize) -> Result<(), OperationError> {
    if op.position > document_len {
        return Err(OperationError::PositionOutOfBounds {
            position: op.position,
            len: document_len,
        });
    }
    if let OpKind::Delete { length } = op.kind {
        if op.position + length > document_len {
            return Err(OperationError::RangeOutOfBounds {
                position: op.position,
                length,
                len: document_len,
            });
        }
    }
    Ok(())
}
