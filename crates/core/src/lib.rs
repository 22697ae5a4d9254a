//! CollabDoc core library.
//!
//! This crate provides the version-control and merge engine for
//! collaborative document editing: per-file version chains, LCS-based line
//! diffs with a unified-diff codec, three-way merges, a branch lifecycle,
//! an operational-transform model for live concurrent edits, and a conflict
//! detector/resolver for those edits.

pub mod audit;
pub mod branch;
pub mod broadcast;
pub mod config;
pub mod conflict;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod models;
pub mod ot;
pub mod versions;

// Re-exports for convenience.
pub use branch::BranchManager;
pub use config::CoreConfig;
pub use conflict::ConflictResolver;
pub use diff::DiffEngine;
pub use engine::CollabEngine;
pub use errors::{CoreError, ErrorKind};
pub use ot::EditorOperation;
pub use versions::VersionStore;
