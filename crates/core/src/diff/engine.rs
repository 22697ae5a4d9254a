//! Line-level diff engine.
//!
//! Builds a longest-common-subsequence table by dynamic programming, walks
//! it back into an edit script, and folds the script into context-framed
//! hunks. Character-level diffs and a similarity score are derived from the
//! same machinery.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::DiffConfig;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of a line within a hunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Context,
    Addition,
    Deletion,
}

/// One line of a hunk, with its 1-based position in either side.
///
/// Context lines carry both positions, deletions only `line_a`, additions
/// only `line_b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
    pub line_a: Option<usize>,
    pub line_b: Option<usize>,
}

/// A contiguous diff region: leading/trailing context plus the changed lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunk {
    /// 1-based line in A where the hunk starts.
    pub start_line_a: usize,
    /// 1-based line in B where the hunk starts.
    pub start_line_b: usize,
    /// Ordered lines of the hunk.
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Number of added lines.
    pub fn additions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind == LineKind::Addition)
            .count()
    }

    /// Number of deleted lines.
    pub fn deletions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind == LineKind::Deletion)
            .count()
    }

    /// Line count of this hunk on the A side (non-addition lines).
    pub fn len_a(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Addition)
            .count()
    }

    /// Line count of this hunk on the B side (non-deletion lines).
    pub fn len_b(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Deletion)
            .count()
    }
}

/// Kind of an edit-script entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Equal,
    Insert,
    Delete,
}

/// A run of consecutive characters sharing one edit kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharEdit {
    pub kind: EditKind,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless line/character diff engine.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    context_lines: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffEngine {
    /// Engine with the standard 3 lines of hunk context.
    pub fn new() -> Self {
        Self { context_lines: 3 }
    }

    /// Engine configured from a [`DiffConfig`].
    pub fn from_config(config: &DiffConfig) -> Self {
        Self {
            context_lines: config.context_lines,
        }
    }

    /// Compute the line-level diff between two texts as hunks.
    ///
    /// Identical texts produce no hunks. Disjoint change regions produce
    /// separate hunks, each framed by up to `context_lines` of context.
    pub fn compute_diff(&self, text_a: &str, text_b: &str) -> Vec<Hunk> {
        if text_a == text_b {
            return Vec::new();
        }
        let lines_a: Vec<&str> = text_a.split('\n').collect();
        let lines_b: Vec<&str> = text_b.split('\n').collect();
        let script = lcs_script(&lines_a, &lines_b);
        self.script_to_hunks(&script)
    }

    /// Character-level diff, grouped into runs of equal/inserted/deleted text.
    pub fn char_diff(&self, text_a: &str, text_b: &str) -> Vec<CharEdit> {
        let chars_a: Vec<char> = text_a.chars().collect();
        let chars_b: Vec<char> = text_b.chars().collect();
        let script = lcs_script(&chars_a, &chars_b);

        let mut edits: Vec<CharEdit> = Vec::new();
        for (kind, ch) in script {
            match edits.last_mut() {
                Some(last) if last.kind == kind => last.text.push(ch),
                _ => edits.push(CharEdit {
                    kind,
                    text: ch.to_string(),
                }),
            }
        }
        edits
    }

    /// Similarity score in `[0, 1]`: `1 - changed_lines / max_line_count`.
    ///
    /// Identical texts score 1; if exactly one side is empty the score is 0.
    pub fn similarity(&self, text_a: &str, text_b: &str) -> f64 {
        if text_a == text_b {
            return 1.0;
        }
        if text_a.is_empty() || text_b.is_empty() {
            return 0.0;
        }
        let hunks = self.compute_diff(text_a, text_b);
        let changed: usize = hunks.iter().map(|h| h.additions() + h.deletions()).sum();
        let max_lines = text_a.split('\n').count().max(text_b.split('\n').count());
        (1.0 - changed as f64 / max_lines as f64).clamp(0.0, 1.0)
    }

    // -----------------------------------------------------------------------
    // Hunk assembly
    // -----------------------------------------------------------------------

    /// Fold an edit script into hunks.
    ///
    /// A hunk opens on the first non-equal entry, pulling in up to
    /// `context_lines` of preceding context, and closes once more than
    /// `context_lines` trailing context lines accumulate (trimmed back to
    /// exactly `context_lines`).
    fn script_to_hunks(&self, script: &[(EditKind, &str)]) -> Vec<Hunk> {
        let mut hunks: Vec<Hunk> = Vec::new();
        let mut pending: VecDeque<DiffLine> = VecDeque::new();
        let mut current: Option<Hunk> = None;
        let mut trailing = 0usize;
        // 1-based numbers of the next line to consume on each side.
        let mut line_a = 1usize;
        let mut line_b = 1usize;

        for &(kind, content) in script {
            match kind {
                EditKind::Equal => {
                    let line = DiffLine {
                        kind: LineKind::Context,
                        content: content.to_string(),
                        line_a: Some(line_a),
                        line_b: Some(line_b),
                    };
                    line_a += 1;
                    line_b += 1;
                    if current.is_some() {
                        if let Some(hunk) = current.as_mut() {
                            hunk.lines.push(line);
                        }
                        trailing += 1;
                        if trailing > self.context_lines {
                            // Trim back to exactly `context_lines` trailing
                            // context; the extra line seeds the next hunk's
                            // leading context.
                            if let Some(mut closed) = current.take() {
                                if let Some(extra) = closed.lines.pop() {
                                    pending.push_back(extra);
                                }
                                hunks.push(closed);
                            }
                            trailing = 0;
                        }
                    } else {
                        pending.push_back(line);
                        if pending.len() > self.context_lines {
                            pending.pop_front();
                        }
                    }
                }
                EditKind::Insert => {
                    let line = DiffLine {
                        kind: LineKind::Addition,
                        content: content.to_string(),
                        line_a: None,
                        line_b: Some(line_b),
                    };
                    open_and_push(&mut current, &mut pending, line, line_a, line_b);
                    line_b += 1;
                    trailing = 0;
                }
                EditKind::Delete => {
                    let line = DiffLine {
                        kind: LineKind::Deletion,
                        content: content.to_string(),
                        line_a: Some(line_a),
                        line_b: None,
                    };
                    open_and_push(&mut current, &mut pending, line, line_a, line_b);
                    line_a += 1;
                    trailing = 0;
                }
            }
        }

        if let Some(hunk) = current {
            hunks.push(hunk);
        }
        hunks
    }
}

/// Append a changed line to the open hunk, opening one (and absorbing the
/// pending leading context) if necessary.
fn open_and_push(
    current: &mut Option<Hunk>,
    pending: &mut VecDeque<DiffLine>,
    line: DiffLine,
    next_line_a: usize,
    next_line_b: usize,
) {
    let hunk = current.get_or_insert_with(|| {
        let (start_a, start_b) = match pending.front() {
            Some(ctx) => (
                ctx.line_a.unwrap_or(next_line_a),
                ctx.line_b.unwrap_or(next_line_b),
            ),
            None => (
                line.line_a.unwrap_or(next_line_a),
                line.line_b.unwrap_or(next_line_b),
            ),
        };
        Hunk {
            start_line_a: start_a,
            start_line_b: start_b,
            lines: pending.drain(..).collect(),
        }
    });
    pending.clear();
    hunk.lines.push(line);
}

// ---------------------------------------------------------------------------
// LCS
// ---------------------------------------------------------------------------

/// Build the edit script between two sequences via an O(n*m) LCS table.
///
/// When both backtrack directions preserve the LCS length, the insert branch
/// is taken, so a replaced region reads deletions-then-additions.
fn lcs_script<T: PartialEq + Copy>(a: &[T], b: &[T]) -> Vec<(EditKind, T)> {
    let m = a.len();
    let n = b.len();
    let mut table = vec![vec![0usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }

    let mut script: Vec<(EditKind, T)> = Vec::with_capacity(m + n);
    let mut i = m;
    let mut j = n;
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            script.push((EditKind::Equal, a[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i][j - 1] >= table[i - 1][j]) {
            script.push((EditKind::Insert, b[j - 1]));
            j -= 1;
        } else {
            script.push((EditKind::Delete, a[i - 1]));
            i -= 1;
        }
    }
    script.reverse();
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DiffEngine {
        DiffEngine::new()
    }

    #[test]
    fn test_identical_texts_have_no_hunks() {
        assert!(engine().compute_diff("", "").is_empty());
        assert!(engine().compute_diff("a\nb\nc", "a\nb\nc").is_empty());
    }

    #[test]
    fn test_single_addition() {
        let hunks = engine().compute_diff("line1", "line1\nline2");
        assert_eq!(hunks.len(), 1);
        let additions: Vec<&DiffLine> = hunks[0]
            .lines
            .iter()
            .filter(|l| l.kind == LineKind::Addition)
            .collect();
        assert_eq!(additions.len(), 1);
        assert_eq!(additions[0].content, "line2");
        assert_eq!(additions[0].line_b, Some(2));
        assert_eq!(hunks[0].start_line_a, 1);
        assert_eq!(hunks[0].start_line_b, 1);
    }

    #[test]
    fn test_replacement_orders_deletion_before_addition() {
        let hunks = engine().compute_diff("a\nold\nc", "a\nnew\nc");
        assert_eq!(hunks.len(), 1);
        let changed: Vec<(LineKind, &str)> = hunks[0]
            .lines
            .iter()
            .filter(|l| l.kind != LineKind::Context)
            .map(|l| (l.kind, l.content.as_str()))
            .collect();
        assert_eq!(
            changed,
            vec![(LineKind::Deletion, "old"), (LineKind::Addition, "new")]
        );
    }

    #[test]
    fn test_line_numbers_in_hunk() {
        let hunks = engine().compute_diff("a\nb\nc\nd", "a\nB\nc\nd");
        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        let deletion = hunk
            .lines
            .iter()
            .find(|l| l.kind == LineKind::Deletion)
            .unwrap();
        assert_eq!(deletion.line_a, Some(2));
        assert_eq!(deletion.line_b, None);
        let addition = hunk
            .lines
            .iter()
            .find(|l| l.kind == LineKind::Addition)
            .unwrap();
        assert_eq!(addition.line_a, None);
        assert_eq!(addition.line_b, Some(2));
    }

    #[test]
    fn test_disjoint_regions_produce_separate_hunks() {
        // Changes at lines 1 and 12 with 10 untouched lines between them.
        let base: Vec<String> = (1..=12).map(|i| format!("line{i}")).collect();
        let mut modified = base.clone();
        modified[0] = "LINE1".into();
        modified[11] = "LINE12".into();
        let hunks = engine().compute_diff(&base.join("\n"), &modified.join("\n"));
        assert_eq!(hunks.len(), 2);
        // First hunk: no leading context, exactly 3 trailing context lines.
        let trailing: Vec<&DiffLine> = hunks[0]
            .lines
            .iter()
            .skip_while(|l| l.kind != LineKind::Addition)
            .skip(1)
            .collect();
        assert_eq!(trailing.len(), 3);
        assert!(trailing.iter().all(|l| l.kind == LineKind::Context));
        // Second hunk starts 3 lines of context before line 12.
        assert_eq!(hunks[1].start_line_a, 9);
    }

    #[test]
    fn test_adjacent_changes_share_one_hunk() {
        let hunks = engine().compute_diff("a\nb\nc\nd\ne", "a\nB\nc\nD\ne");
        // Only one context line between the changes, so they stay together.
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].additions(), 2);
        assert_eq!(hunks[0].deletions(), 2);
    }

    #[test]
    fn test_char_diff_groups_runs() {
        let edits = engine().char_diff("kitten", "sitting");
        assert!(edits.iter().any(|e| e.kind == EditKind::Equal));
        // Reassembling the B side from equal+insert runs gives back B.
        let b_side: String = edits
            .iter()
            .filter(|e| e.kind != EditKind::Delete)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(b_side, "sitting");
        let a_side: String = edits
            .iter()
            .filter(|e| e.kind != EditKind::Insert)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(a_side, "kitten");
    }

    #[test]
    fn test_similarity_bounds() {
        let engine = engine();
        assert_eq!(engine.similarity("same\ntext", "same\ntext"), 1.0);
        assert_eq!(engine.similarity("", "anything"), 0.0);
        assert_eq!(engine.similarity("anything", ""), 0.0);
        // Full single-line replacement counts 2 changed lines over max 1,
        // clamped to 0.
        assert_eq!(engine.similarity("line1", "line2"), 0.0);
        let partial = engine.similarity("a\nb\nc\nd", "a\nb\nc\nD");
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[test]
    fn test_lcs_script_roundtrip() {
        let a: Vec<char> = "abcdef".chars().collect();
        let b: Vec<char> = "abXdYf".chars().collect();
        let script = lcs_script(&a, &b);
        let rebuilt_b: String = script
            .iter()
            .filter(|(k, _)| *k != EditKind::Delete)
            .map(|(_, c)| *c)
            .collect();
        assert_eq!(rebuilt_b, "abXdYf");
        let rebuilt_a: String = script
            .iter()
            .filter(|(k, _)| *k != EditKind::Insert)
            .map(|(_, c)| *c)
            .collect();
        assert_eq!(rebuilt_a, "abcdef");
    }
}
