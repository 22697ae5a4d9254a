//! Error types for the CollabDoc core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type. Every error maps onto one of three [`ErrorKind`]s,
//! which is what callers should match on for control flow.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// The coarse classification every core error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An id (file, version, branch, conflict) did not resolve.
    NotFound,
    /// The operation is disallowed in the aggregate's current status.
    InvalidState,
    /// An input failed validation before any mutation took place.
    ValidationFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::InvalidState => write!(f, "invalid_state"),
            Self::ValidationFailure => write!(f, "validation_failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Branch(#[from] BranchError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl CoreError {
    /// The [`ErrorKind`] of the underlying subsystem error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Diff(e) => e.kind(),
            Self::Version(e) => e.kind(),
            Self::Branch(e) => e.kind(),
            Self::Operation(e) => e.kind(),
            Self::Conflict(e) => e.kind(),
            Self::Config(e) => e.kind(),
            Self::Audit(e) => e.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Diff errors
// ---------------------------------------------------------------------------

/// Errors from the diff engine (patch parsing and application).
#[derive(Debug, Error)]
pub enum DiffError {
    /// A unified-diff hunk header could not be parsed.
    #[error("invalid patch at line {line}: {detail}")]
    InvalidPatch { line: usize, detail: String },
}

impl DiffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPatch { .. } => ErrorKind::ValidationFailure,
        }
    }
}

// ---------------------------------------------------------------------------
// Version store errors
// ---------------------------------------------------------------------------

/// Errors from the version store.
#[derive(Debug, Error)]
pub enum VersionError {
    /// The requested version id is unknown.
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// The file has no versions at all.
    #[error("no versions for file: {0}")]
    FileNotFound(String),

    /// The version is not part of the given file's chain.
    #[error("version {version_id} does not belong to file {file_id}")]
    VersionNotInFile {
        version_id: String,
        file_id: String,
    },

    /// Attempted to delete the file's current version.
    #[error("cannot delete the current version {0}")]
    CurrentVersionProtected(String),
}

impl VersionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VersionNotFound(_) | Self::FileNotFound(_) | Self::VersionNotInFile { .. } => {
                ErrorKind::NotFound
            }
            Self::CurrentVersionProtected(_) => ErrorKind::InvalidState,
        }
    }
}

// ---------------------------------------------------------------------------
// Branch errors
// ---------------------------------------------------------------------------

/// Errors from the branch manager.
#[derive(Debug, Error)]
pub enum BranchError {
    /// The requested branch id is unknown.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// The operation requires an active branch.
    #[error("branch {id} is not active (status: {status})")]
    NotActive { id: String, status: String },

    /// The two branches belong to different files.
    #[error("branches {source_branch} and {target} belong to different files")]
    FileMismatch { source_branch: String, target: String },

    /// The three-way merge found overlapping changes.
    ///
    /// The source branch has already been marked abandoned by the time this
    /// error is returned.
    #[error("merge of branch {source_branch} into {target} has conflicts")]
    MergeConflict { source_branch: String, target: String },

    /// Active branches cannot be deleted.
    #[error("cannot delete active branch {0}")]
    ActiveBranchProtected(String),

    /// A manual resolution entry was submitted without content.
    #[error("manual resolution for '{path}' requires content")]
    MissingResolutionContent { path: String },

    /// Underlying version store error.
    #[error(transparent)]
    Version(#[from] VersionError),
}

impl BranchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BranchNotFound(_) => ErrorKind::NotFound,
            Self::NotActive { .. }
            | Self::FileMismatch { .. }
            | Self::MergeConflict { .. }
            | Self::ActiveBranchProtected(_) => ErrorKind::InvalidState,
            Self::MissingResolutionContent { .. } => ErrorKind::ValidationFailure,
            Self::Version(e) => e.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation errors
// ---------------------------------------------------------------------------

/// Errors from operation validation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The operation position lies outside the document.
    #[error("position {position} is out of bounds for document of length {len}")]
    PositionOutOfBounds { position: usize, len: usize },

    /// A delete range runs past the end of the document.
    #[error("delete of {length} at {position} exceeds document length {len}")]
    RangeOutOfBounds {
        position: usize,
        length: usize,
        len: usize,
    },
}

impl OperationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PositionOutOfBounds { .. } | Self::RangeOutOfBounds { .. } => {
                ErrorKind::ValidationFailure
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from the conflict resolver.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// The requested conflict id is unknown.
    #[error("conflict not found: {0}")]
    NotFound(String),

    /// The conflict has already been resolved.
    #[error("conflict {0} is already resolved")]
    AlreadyResolved(String),
}

impl ConflictError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyResolved(_) => ErrorKind::InvalidState,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound(_) => ErrorKind::NotFound,
            Self::ParseError(_) | Self::InvalidValue { .. } | Self::IoError(_) => {
                ErrorKind::ValidationFailure
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Audit errors
// ---------------------------------------------------------------------------

/// Errors from an audit sink. Always treated as best-effort by callers.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The sink could not accept the record.
    #[error("audit sink unavailable: {0}")]
    SinkUnavailable(String),
}

impl AuditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SinkUnavailable(_) => ErrorKind::InvalidState,
        }
    }
}
