//! Line diff, unified-diff codec, and three-way merge.
//!
//! The diff subsystem is responsible for:
//! 1. **Diffing** -- LCS-based line and character edit scripts, folded into
//!    context-framed hunks.
//! 2. **Patching** -- unified-diff serialization and textual application.
//! 3. **Merging** -- three-way merges with changed-range conflict detection.

mod engine;
mod merge;
mod unified;

pub use engine::{CharEdit, DiffEngine, DiffLine, EditKind, Hunk, LineKind};
