//! Versioned schema scripts
//!
//! A schema script is plain SQL, one statement per `;`. Upgrades are not
//! incremental: when the stored `PRAGMA user_version` differs from the
//! script's version the whole script runs again, and the script drops every
//! table before recreating it.

use sqlx::SqlitePool;

use crate::error::AppError;

/// Schema bundled with this build
pub const BUNDLED: SchemaScript = SchemaScript {
    version: 1,
    source: include_str!("../../schema/v1.sql"),
};

/// A versioned schema script
#[derive(Debug, Clone, Copy)]
pub struct SchemaScript {
    pub version: i64,
    pub source: &'static str,
}

impl SchemaScript {
    /// Split the script into executable statements
    ///
    /// `--` comment lines and empty statements are dropped.
    pub fn statements(&self) -> Vec<String> {
        self.source
            .split(';')
            .map(|chunk| {
                chunk
                    .lines()
                    .filter(|line| !line.trim_start().starts_with("--"))
                    .collect::<Vec<_>>()
                    .join("\n")
                    .trim()
                    .to_string()
            })
            .filter(|statement| !statement.is_empty())
            .collect()
    }
}

/// Read the version stamped into the database file
pub async fn current_version(pool: &SqlitePool) -> Result<i64, AppError> {
    let version = sqlx::query_scalar::<_, i64>("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Bring the database to `script`'s version
///
/// # Returns
/// `true` if the tables were (re)created, `false` if already current
pub async fn apply(pool: &SqlitePool, script: &SchemaScript) -> Result<bool, AppError> {
    let current = current_version(pool).await?;
    if current == script.version {
        return Ok(false);
    }

    tracing::info!(
        from = current,
        to = script.version,
        "Recreating local store schema"
    );

    let mut tx = pool.begin().await?;
    for statement in script.statements() {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, statement = %statement, "Schema statement failed");
                AppError::Schema(format!("{e}: {statement}"))
            })?;
    }

    let stamp = format!("PRAGMA user_version = {}", script.version);
    sqlx::query(&stamp).execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_skip_comments_and_blanks() {
        let script = SchemaScript {
            version: 7,
            source: "-- header\n\nCREATE TABLE a (id INTEGER);\n;\n-- trailing\nDROP TABLE b;\n",
        };

        assert_eq!(
            script.statements(),
            vec!["CREATE TABLE a (id INTEGER)", "DROP TABLE b"]
        );
    }

    #[test]
    fn bundled_script_creates_every_logical_table() {
        let statements = BUNDLED.statements();
        for table in [
            "home_timeline",
            "mentions_timeline",
            "user_timeline",
            "fixed_query_timeline",
            "query_timeline",
            "list_timeline",
            "users",
        ] {
            let create = format!("CREATE TABLE {table} (");
            assert!(
                statements.iter().any(|s| s.starts_with(&create)),
                "missing table {table}"
            );
            let drop = format!("DROP TABLE IF EXISTS {table}");
            assert!(statements.contains(&drop), "missing drop of {table}");
        }
    }
}
