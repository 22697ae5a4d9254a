//! Unified-diff serialization and textual patch application.

use crate::errors::DiffError;

use super::engine::{DiffEngine, LineKind};

impl DiffEngine {
    /// Render the diff between two texts in unified-diff format.
    ///
    /// Emits `--- a/<file>` / `+++ b/<file>` headers followed by one
    /// `@@ -startA,lenA +startB,lenB @@` section per hunk, where `lenA` and
    /// `lenB` count the non-addition and non-deletion lines respectively.
    pub fn to_unified_diff(&self, text_a: &str, text_b: &str, file_name: &str) -> String {
        let hunks = self.compute_diff(text_a, text_b);

        let mut out = String::new();
        out.push_str(&format!("--- a/{file_name}\n"));
        out.push_str(&format!("+++ b/{file_name}\n"));

        for hunk in &hunks {
            out.push_str(&format!(
                "@@ -{},{} +{},{} @@\n",
                hunk.start_line_a,
                hunk.len_a(),
                hunk.start_line_b,
                hunk.len_b(),
            ));
            for line in &hunk.lines {
                let prefix = match line.kind {
                    LineKind::Context => ' ',
                    LineKind::Addition => '+',
                    LineKind::Deletion => '-',
                };
                out.push(prefix);
                out.push_str(&line.content);
                out.push('\n');
            }
        }
        out
    }

    /// Apply a unified-diff patch to a text.
    ///
    /// The patch is parsed textually: file headers are skipped, each hunk
    /// header positions a cursor into the old text (old-side coordinates),
    /// and context/deletion/addition lines splice the old lines out while
    /// the new ones are inserted at the cursor.
    pub fn apply_patch(&self, text: &str, patch: &str) -> Result<String, DiffError> {
        let old_lines: Vec<&str> = text.split('\n').collect();
        let mut result: Vec<String> = Vec::new();
        let mut cursor = 0usize;
        let mut in_hunk = false;

        for (idx, raw) in patch.split('\n').enumerate() {
            if raw.starts_with("--- ") || raw.starts_with("+++ ") {
                continue;
            }
            if raw.starts_with("@@") {
                let old_start = parse_hunk_header(raw).map_err(|detail| {
                    DiffError::InvalidPatch {
                        line: idx + 1,
                        detail,
                    }
                })?;
                // Copy untouched lines up to the hunk start.
                let target = old_start.saturating_sub(1);
                while cursor < target && cursor < old_lines.len() {
                    result.push(old_lines[cursor].to_string());
                    cursor += 1;
                }
                in_hunk = true;
                continue;
            }
            if !in_hunk {
                continue;
            }
            match raw.chars().next() {
                Some(' ') => {
                    if cursor < old_lines.len() {
                        result.push(old_lines[cursor].to_string());
                    } else {
                        result.push(raw[1..].to_string());
                    }
                    cursor += 1;
                }
                Some('+') => result.push(raw[1..].to_string()),
                Some('-') => cursor += 1,
                // "\ No newline at end of file" markers and blank separator
                // lines carry no content.
                Some('\\') | None => {}
                Some(_) => {}
            }
        }

        while cursor < old_lines.len() {
            result.push(old_lines[cursor].to_string());
            cursor += 1;
        }
        Ok(result.join("\n"))
    }
}

/// Parse `@@ -oldStart[,oldLen] +newStart[,newLen] @@` and return `oldStart`.
fn parse_hunk_header(header: &str) -> Result<usize, String> {
    let old_range = header
        .split_whitespace()
        .find(|tok| tok.starts_with('-'))
        .ok_or_else(|| "missing old range".to_string())?;
    let old_start = old_range
        .trim_start_matches('-')
        .split(',')
        .next()
        .unwrap_or_default();
    old_start
        .parse::<usize>()
        .map_err(|_| format!("bad old range '{old_range}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DiffEngine {
        DiffEngine::new()
    }

    #[test]
    fn test_unified_diff_headers() {
        let patch = engine().to_unified_diff("line1\nline2", "line1\nline2-modified", "test.txt");
        assert!(patch.contains("--- a/test.txt"));
        assert!(patch.contains("+++ b/test.txt"));
        assert!(patch.lines().any(|l| l.starts_with("@@")));
        assert!(patch.contains("-line2"));
        assert!(patch.contains("+line2-modified"));
    }

    #[test]
    fn test_unified_diff_identical_texts_is_headers_only() {
        let patch = engine().to_unified_diff("same", "same", "f.txt");
        assert_eq!(patch, "--- a/f.txt\n+++ b/f.txt\n");
    }

    #[test]
    fn test_hunk_header_counts() {
        // One replacement framed by one context line each side:
        // 3 old-side lines, 3 new-side lines.
        let patch = engine().to_unified_diff("a\nold\nc", "a\nnew\nc", "f");
        assert!(patch.contains("@@ -1,3 +1,3 @@"));
    }

    #[test]
    fn test_roundtrip_modification() {
        let a = "line1\nline2\nline3";
        let b = "line1\nline2-modified\nline3";
        let patch = engine().to_unified_diff(a, b, "doc.txt");
        assert_eq!(engine().apply_patch(a, &patch).unwrap(), b);
    }

    #[test]
    fn test_roundtrip_addition_and_deletion() {
        let a = "one\ntwo\nthree\nfour";
        let b = "one\nthree\nfour\nfive";
        let patch = engine().to_unified_diff(a, b, "doc.txt");
        assert_eq!(engine().apply_patch(a, &patch).unwrap(), b);
    }

    #[test]
    fn test_roundtrip_multiple_hunks() {
        let a: Vec<String> = (1..=20).map(|i| format!("line{i}")).collect();
        let mut b = a.clone();
        b[1] = "LINE2".into();
        b[17] = "LINE18".into();
        let a = a.join("\n");
        let b = b.join("\n");
        let patch = engine().to_unified_diff(&a, &b, "doc.txt");
        assert_eq!(patch.matches("@@").count(), 2);
        assert_eq!(engine().apply_patch(&a, &patch).unwrap(), b);
    }

    #[test]
    fn test_roundtrip_from_empty() {
        let a = "";
        let b = "first\nsecond";
        let patch = engine().to_unified_diff(a, b, "doc.txt");
        assert_eq!(engine().apply_patch(a, &patch).unwrap(), b);
    }

    #[test]
    fn test_roundtrip_empty_lines_preserved() {
        let a = "top\n\nbottom";
        let b = "top\n\nBOTTOM";
        let patch = engine().to_unified_diff(a, b, "doc.txt");
        assert_eq!(engine().apply_patch(a, &patch).unwrap(), b);
    }

    #[test]
    fn test_malformed_hunk_header_is_rejected() {
        let patch = "--- a/f\n+++ b/f\n@@ -x,1 +1,1 @@\n-old\n+new\n";
        let err = engine().apply_patch("old", patch).unwrap_err();
        assert!(matches!(err, DiffError::InvalidPatch { line: 3, .. }));
    }

    #[test]
    fn test_empty_patch_leaves_text_unchanged() {
        let patch = engine().to_unified_diff("same", "same", "f");
        assert_eq!(engine().apply_patch("same", &patch).unwrap(), "same");
    }
}
