//! Storage configuration types.

use serde::Deserialize;

use crate::storage::query::DEFAULT_MAX_BIND_PARAMS;

/// Storage type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Sqlite,
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// Database file path, or `:memory:` for a throwaway database.
    pub path: String,
    /// Upper bound on bind parameters in a single statement.
    /// Larger batches are split into several statements in the same transaction.
    pub max_bind_params: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            path: "data/socialgraph.db".to_string(),
            max_bind_params: DEFAULT_MAX_BIND_PARAMS,
        }
    }
}

impl StorageConfig {
    /// Connection URL for the configured database.
    pub fn url(&self) -> String {
        if self.path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", self.path)
        }
    }
}
