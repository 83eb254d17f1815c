//! SQLite database operations
//!
//! Owns the connection pool shared by every store, applies the versioned
//! schema on connect, and hosts the preferences key/value area used by the
//! session.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use super::schema::{self, SchemaScript};
use crate::error::AppError;

/// Database connection pool wrapper.
///
/// Stores acquire a connection per operation and hand it back when the read
/// or transaction ends; nothing holds a connection between calls.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist and brings it to the
    /// bundled schema version.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    /// * `max_connections` - Pool size
    ///
    /// # Errors
    /// Returns error if connection or schema setup fails
    pub async fn connect(path: &Path, max_connections: u32) -> Result<Self, AppError> {
        Self::connect_with_schema(path, max_connections, &schema::BUNDLED).await
    }

    /// Connect and apply an explicit schema script
    pub async fn connect_with_schema(
        path: &Path,
        max_connections: u32,
        script: &SchemaScript,
    ) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let recreated = schema::apply(&pool, script).await?;
        ensure_preferences_table(&pool).await?;

        tracing::info!(
            path = %path.display(),
            schema_version = script.version,
            recreated,
            "Database connected"
        );

        Ok(Self { pool })
    }

    /// Shared pool, handed to the store factory
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Version stamped into the database file
    pub async fn schema_version(&self) -> Result<i64, AppError> {
        schema::current_version(&self.pool).await
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    /// Get preference value
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>, AppError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    /// Set preference value
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query("INSERT OR REPLACE INTO preferences (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Remove one preference
    pub async fn remove_preference(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Remove every preference
    pub async fn clear_preferences(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM preferences")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Write several preferences atomically
    ///
    /// `None` values remove the key.
    pub async fn write_preferences(&self, entries: &[(&str, Option<String>)]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for (key, value) in entries {
            match value {
                Some(value) => {
                    sqlx::query("INSERT OR REPLACE INTO preferences (key, value) VALUES (?, ?)")
                        .bind(*key)
                        .bind(value)
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    sqlx::query("DELETE FROM preferences WHERE key = ?")
                        .bind(*key)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

/// The preferences area survives schema upgrades, so it is not part of the
/// versioned script.
async fn ensure_preferences_table(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS preferences (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
