//! Governance configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! max_repair_cycles = 3
//! excluded_fields = ["id", "created_at", "updated_at", "timestamp", "generated_at", "recorded_at"]
//! recovery_reason = "recovered after interrupted critical section"
//!
//! [log]
//! filter = "info"
//! json = false
//! ```

use serde::{Deserialize, Serialize};
use stagegate_artifact::DEFAULT_EXCLUDED_FIELDS;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Total `verification_failed -> building` edges a unit may take
    pub max_repair_cycles: u32,
    /// Volatile fields stripped before hashing
    pub excluded_fields: Vec<String>,
    /// Pause reason written by the recovery sweep
    pub recovery_reason: String,
    pub log: LogConfig,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            max_repair_cycles: 3,
            excluded_fields: DEFAULT_EXCLUDED_FIELDS.iter().map(ToString::to_string).collect(),
            recovery_reason: "recovered after interrupted critical section".to_string(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl GovernanceConfig {
    /// Parse from a TOML string
    ///
    /// # Errors
    /// Returns error if the TOML is malformed
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
