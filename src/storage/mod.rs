//! Storage implementations.
//!
//! The edge store exposes atomic mutation primitives only. It never opens
//! or commits a transaction on behalf of a mutation; callers begin one with
//! [`SqliteEdgeStore::begin`] and pass the connection to each primitive.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

pub mod query;
pub mod schema;
pub mod sqlite;

pub use crate::config::{StorageConfig, StorageType};
pub use sqlite::SqliteEdgeStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid user id: {0}")]
    InvalidUserId(#[from] uuid::Error),

    #[error("Unknown edge state code: {0}")]
    UnknownEdgeState(i64),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How long a connection waits on a locked database before SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Initialize storage based on configuration.
///
/// Opens the pool and creates the schema if it does not exist.
pub async fn init_storage(config: &StorageConfig) -> Result<SqliteEdgeStore> {
    info!("Storage: {} at {}", config.storage_type, config.path);

    match config.storage_type {
        StorageType::Sqlite => {
            if config.path != ":memory:" {
                if let Some(parent) = std::path::Path::new(&config.path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
            }

            if config.max_bind_params == 0 {
                return Err(StorageError::Config(
                    "max_bind_params must be greater than zero".to_string(),
                ));
            }

            let options = SqliteConnectOptions::from_str(&config.url())?
                .busy_timeout(BUSY_TIMEOUT)
                .create_if_missing(true);

            // Each connection to `:memory:` is a separate database.
            let (options, max_connections) = if config.path == ":memory:" {
                (options, 1)
            } else {
                (options.journal_mode(SqliteJournalMode::Wal), 10)
            };

            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await?;
            let store = SqliteEdgeStore::with_max_bind_params(pool, config.max_bind_params);
            store.init().await?;

            Ok(store)
        }
    }
}
