//! TOML-based configuration for the CollabDoc core.
//!
//! The core is a library, so configuration stays small: logging verbosity,
//! an optional workspace id stamped onto audit records, and diff tuning.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ConfigError;

/// Widest hunk context the diff engine will accept.
const MAX_CONTEXT_LINES: usize = 100;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Core configuration loaded from a TOML file or built in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Workspace id attached to audit records (opaque, optional).
    #[serde(default)]
    pub workspace_id: Option<String>,

    /// Diff engine settings.
    #[serde(default)]
    pub diff: DiffConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            workspace_id: None,
            diff: DiffConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Diff engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Context lines kept around each hunk (default 3).
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

fn default_context_lines() -> usize {
    3
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl CoreConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        debug!(path = %path.display(), "loaded core configuration");
        Ok(config)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "log_level".into(),
                    detail: format!("unknown level '{other}'"),
                });
            }
        }
        if self.diff.context_lines > MAX_CONTEXT_LINES {
            return Err(ConfigError::InvalidValue {
                field: "diff.context_lines".into(),
                detail: format!("must be at most {MAX_CONTEXT_LINES}"),
            });
        }
        Ok(())
    }
}
