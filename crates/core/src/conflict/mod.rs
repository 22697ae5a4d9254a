//! Conflict detection and resolution for concurrent editor operations.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- pairwise classification of concurrent operations.
//! 2. **Resolution** -- automatic and manual strategies over the detected
//!    conflicts, plus side-by-side previews.

pub mod detector;
pub mod resolver;

pub use detector::{Conflict, ConflictDetector, ConflictType, ResolutionStrategy};
pub use resolver::{ConflictResolver, ExtendedConflict};
