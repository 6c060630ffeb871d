use chrono::Utc;

use super::{Database, DatabaseError};

/// One string-valued setting. The account list lives under a single key as a JSON
/// array and is rewritten wholesale on every change; there is no incremental diff.
pub(crate) struct Setting;

impl Setting {
    /// Returns the stored value for `key`, or `None` when the key has never been
    /// written.
    pub(crate) async fn fetch(
        key: &str,
        database: &Database,
    ) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&database.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Overwrites the value for `key` in full.
    pub(crate) async fn upsert(
        key: &str,
        value: &str,
        database: &Database,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(&database.pool)
        .await?;

        tracing::debug!(target: "beacon::database::settings", "Updated setting {}", key);
        Ok(())
    }
}
