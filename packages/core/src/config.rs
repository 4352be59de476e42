//! Engine configuration
//!
//! Defaults mirror the app's data layout (`~/.coursetree/database/`), and each
//! field that deployments commonly change has an environment override.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding [`TreeConfig::database_path`]
pub const DB_PATH_ENV: &str = "COURSETREE_DB_PATH";

/// Environment variable overriding [`TreeConfig::root_value`]
pub const ROOT_VALUE_ENV: &str = "COURSETREE_ROOT_VALUE";

/// Tree engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// libsql database file used by `TursoStore`
    pub database_path: PathBuf,

    /// Value given to an owner's root when it is provisioned
    pub root_value: String,

    /// Minimum node value length, in characters, after trimming
    pub min_value_len: usize,

    /// Maximum node value length, in characters, after trimming
    pub max_value_len: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            root_value: "Subjects".to_string(),
            min_value_len: 4,
            max_value_len: 20,
        }
    }
}

/// `~/.coursetree/database/coursetree.db`, or relative to the working
/// directory when no home directory is known
pub fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".coursetree")
        .join("database")
        .join("coursetree.db")
}

impl TreeConfig {
    /// Defaults with `COURSETREE_*` environment overrides applied
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides taken from `lookup`; blank values are ignored
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_blank(DB_PATH_ENV) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(value) = non_blank(ROOT_VALUE_ENV) {
            config.root_value = value.trim().to_string();
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database_path.as_os_str().is_empty() {
            return Err("database_path cannot be empty".to_string());
        }

        if self.root_value.trim().is_empty() {
            return Err("root_value cannot be empty".to_string());
        }

        if self.max_value_len == 0 {
            return Err("max_value_len must be greater than 0".to_string());
        }

        if self.min_value_len > self.max_value_len {
            return Err(format!(
                "min_value_len ({}) cannot exceed max_value_len ({})",
                self.min_value_len, self.max_value_len
            ));
        }

        Ok(())
    }
}
