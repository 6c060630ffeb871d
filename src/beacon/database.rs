mod settings;

pub(crate) use settings::Setting;

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// SQLite-backed local store. Currently holds only the `settings` table, a
/// key/value map where each key owns one whole string value that is overwritten
/// in full on every change.
pub struct Database {
    pub(crate) pool: SqlitePool,
    #[allow(dead_code)]
    pub(crate) path: PathBuf,
}

impl Database {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::create_schema(&pool).await?;

        tracing::debug!(
            target: "beacon::database",
            "Opened database at {:?}",
            path
        );

        Ok(Self { pool, path })
    }

    /// In-memory database for tests.
    #[cfg(test)]
    pub(crate) async fn new_in_memory() -> Result<Self, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::create_schema(&pool).await?;
        Ok(Self {
            pool,
            path: PathBuf::from(":memory:"),
        })
    }

    async fn create_schema(pool: &SqlitePool) -> Result<(), DatabaseError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}
