//! Three-way merge built on the line diff.
//!
//! Both sides are diffed against the base independently; the merge succeeds
//! when their changed-line ranges do not overlap, and the combined hunk sets
//! are then applied to the base in a single pass.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::engine::{DiffEngine, Hunk, LineKind};

impl DiffEngine {
    /// Merge two divergent edits of `base`.
    ///
    /// Returns the merged text, or `None` when the two sides' changed-line
    /// ranges overlap (the conflict signal — never an error).
    pub fn three_way_merge(&self, base: &str, theirs: &str, yours: &str) -> Option<String> {
        let hunks_theirs = self.compute_diff(base, theirs);
        let hunks_yours = self.compute_diff(base, yours);

        if has_merge_conflicts(&hunks_theirs, &hunks_yours) {
            debug!("three-way merge aborted: overlapping change ranges");
            return None;
        }

        debug!(
            theirs_hunks = hunks_theirs.len(),
            yours_hunks = hunks_yours.len(),
            "three-way merge is clean"
        );
        Some(apply_combined(base, &hunks_theirs, &hunks_yours))
    }
}

/// Whether two hunk sets touch overlapping line ranges of the base.
///
/// Ranges are built from deletion line numbers only: a pure-addition hunk
/// marks a change but contributes no range, so same-line insertions from
/// both sides pass the check and merge.
pub(crate) fn has_merge_conflicts(hunks_a: &[Hunk], hunks_b: &[Hunk]) -> bool {
    let ranges_a = deletion_ranges(hunks_a);
    let ranges_b = deletion_ranges(hunks_b);
    for &(start_a, end_a) in &ranges_a {
        for &(start_b, end_b) in &ranges_b {
            if start_a <= end_b && start_b <= end_a {
                return true;
            }
        }
    }
    false
}

/// Per-hunk `(first, last)` deleted base-line numbers.
fn deletion_ranges(hunks: &[Hunk]) -> Vec<(usize, usize)> {
    hunks
        .iter()
        .filter_map(|hunk| {
            let mut range: Option<(usize, usize)> = None;
            for line in &hunk.lines {
                if line.kind == LineKind::Deletion {
                    if let Some(n) = line.line_a {
                        range = Some(match range {
                            None => (n, n),
                            Some((start, end)) => (start.min(n), end.max(n)),
                        });
                    }
                }
            }
            range
        })
        .collect()
}

/// Apply both hunk sets to the base in one pass, ordered by hunk start line
/// (ties keep the first set's insertions first).
fn apply_combined(base: &str, hunks_theirs: &[Hunk], hunks_yours: &[Hunk]) -> String {
    let mut hunks: Vec<&Hunk> = hunks_theirs.iter().chain(hunks_yours.iter()).collect();
    hunks.sort_by_key(|h| h.start_line_a);

    let base_lines: Vec<&str> = base.split('\n').collect();
    let mut deleted: HashSet<usize> = HashSet::new();
    // Base-line number each insertion lands before; values keep push order.
    let mut insertions: BTreeMap<usize, Vec<String>> = BTreeMap::new();

    for hunk in hunks {
        let mut cursor_a = hunk.start_line_a;
        for line in &hunk.lines {
            match line.kind {
                LineKind::Context => cursor_a += 1,
                LineKind::Deletion => {
                    deleted.insert(line.line_a.unwrap_or(cursor_a));
                    cursor_a += 1;
                }
                LineKind::Addition => {
                    insertions
                        .entry(cursor_a)
                        .or_default()
                        .push(line.content.clone());
                }
            }
        }
    }

    let mut merged: Vec<String> = Vec::new();
    for (idx, line) in base_lines.iter().enumerate() {
        let number = idx + 1;
        if let Some(added) = insertions.get(&number) {
            merged.extend(added.iter().cloned());
        }
        if !deleted.contains(&number) {
            merged.push((*line).to_string());
        }
    }
    // Insertions anchored past the last base line append at the end.
    if let Some(added) = insertions.get(&(base_lines.len() + 1)) {
        merged.extend(added.iter().cloned());
    }
    merged.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DiffEngine {
        DiffEngine::new()
    }

    #[test]
    fn test_all_sides_identical() {
        let base = "line1\nline2\nline3";
        assert_eq!(
            engine().three_way_merge(base, base, base).as_deref(),
            Some(base)
        );
    }

    #[test]
    fn test_only_theirs_changed() {
        let base = "line1\nline2\nline3";
        let theirs = "line1\nmodified\nline3";
        let merged = engine().three_way_merge(base, theirs, base).unwrap();
        assert_eq!(merged, theirs);
    }

    #[test]
    fn test_only_yours_changed() {
        let base = "line1\nline2\nline3";
        let yours = "line1\nline2\nmodified";
        let merged = engine().three_way_merge(base, base, yours).unwrap();
        assert_eq!(merged, yours);
    }

    #[test]
    fn test_non_overlapping_changes_combine() {
        let base = "line1\nline2\nline3";
        let theirs = "line1\nline2-modified\nline3";
        let yours = "line1\nline2\nline3-modified";
        let merged = engine().three_way_merge(base, theirs, yours).unwrap();
        assert!(merged.contains("line2-modified"));
        assert!(merged.contains("line3-modified"));
        assert_eq!(merged, "line1\nline2-modified\nline3-modified");
    }

    #[test]
    fn test_same_line_edits_conflict() {
        let base = "line1\nline2\nline3";
        let theirs = "line1\nline2-version-a\nline3";
        let yours = "line1\nline2-version-b\nline3";
        assert!(engine().three_way_merge(base, theirs, yours).is_none());
    }

    #[test]
    fn test_overlapping_delete_ranges_conflict() {
        let base = "a\nb\nc\nd\ne";
        let theirs = "a\ne"; // deletes b, c, d
        let yours = "a\nb\nd\ne"; // deletes c
        assert!(engine().three_way_merge(base, theirs, yours).is_none());
    }

    #[test]
    fn test_same_line_insertions_merge_silently() {
        // Pure additions carry no deletion range, so both sides inserting at
        // the same spot pass the conflict check and both lines survive.
        let base = "line1\nline2";
        let theirs = "line1\nfrom-theirs\nline2";
        let yours = "line1\nfrom-yours\nline2";
        let merged = engine().three_way_merge(base, theirs, yours).unwrap();
        assert!(merged.contains("from-theirs"));
        assert!(merged.contains("from-yours"));
    }

    #[test]
    fn test_additions_at_both_ends() {
        let base = "middle1\nmiddle2\nmiddle3\nmiddle4\nmiddle5\nmiddle6\nmiddle7";
        let theirs = "top\nmiddle1\nmiddle2\nmiddle3\nmiddle4\nmiddle5\nmiddle6\nmiddle7";
        let yours = "middle1\nmiddle2\nmiddle3\nmiddle4\nmiddle5\nmiddle6\nmiddle7\nbottom";
        let merged = engine().three_way_merge(base, theirs, yours).unwrap();
        assert_eq!(
            merged,
            "top\nmiddle1\nmiddle2\nmiddle3\nmiddle4\nmiddle5\nmiddle6\nmiddle7\nbottom"
        );
    }

    #[test]
    fn test_delete_and_distant_edit_combine() {
        let base: Vec<String> = (1..=12).map(|i| format!("row{i}")).collect();
        let base = base.join("\n");
        let theirs = base.replacen("row1\n", "", 1); // deletes row1
        let yours = base.replace("row12", "row12-changed");
        let merged = engine().three_way_merge(&base, &theirs, &yours).unwrap();
        assert!(!merged.contains("row1\n"));
        assert!(merged.contains("row12-changed"));
    }
}
