//! Generic local store
//!
//! A [`LocalStore`] binds one logical table to one entity kind. Reads are
//! fail-soft: a storage failure is logged and reads as "not found". Writes go
//! through an explicit [`StoreTransaction`], and the first failing statement
//! poisons it so that nothing from the batch is ever committed.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Encode, SqlitePool, Transaction, Type};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::mapping::{EntityKind, SqliteQuery};
use crate::error::AppError;
use crate::metrics::{DB_TRANSACTIONS_TOTAL, observe_db_query};

/// A value the local store can persist
pub trait Entity: Send + Sync + Unpin + 'static {
    /// Identifier type bound into by-id statements
    type Id: for<'q> Encode<'q, Sqlite> + Type<Sqlite> + Copy + Send + Sync + fmt::Debug + 'static;

    const KIND: EntityKind;

    fn id(&self) -> Self::Id;

    /// Build a fresh value from a persisted row
    fn from_row(row: &SqliteRow) -> Self;

    /// Bind every non-id column in `EntityKind::columns()` order
    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;
}

/// SQL for one logical table
#[derive(Debug, Clone)]
pub struct Statements {
    pub select_by_id: String,
    pub select_all: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
    pub delete_all: String,
    pub count: String,
}

impl Statements {
    /// Generate the statement set for `table` holding `kind` rows
    pub fn for_table(table: &str, kind: EntityKind) -> Self {
        let columns = kind.columns();
        let placeholders = vec!["?"; columns.len() + 1].join(", ");
        let assignments = columns
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            select_by_id: format!("SELECT * FROM {table} WHERE id = ?"),
            select_all: format!("SELECT * FROM {table}"),
            insert: format!(
                "INSERT INTO {table} (id, {}) VALUES ({placeholders})",
                columns.join(", ")
            ),
            update: format!("UPDATE {table} SET {assignments} WHERE id = ?"),
            delete: format!("DELETE FROM {table} WHERE id = ?"),
            delete_all: format!("DELETE FROM {table}"),
            count: format!("SELECT COUNT(*) FROM {table}"),
        }
    }
}

/// Construction-time configuration of a store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub table: String,
    pub kind: EntityKind,
    pub statements: Statements,
}

impl StoreConfig {
    pub fn for_table(table: impl Into<String>, kind: EntityKind) -> Self {
        let table = table.into();
        let statements = Statements::for_table(&table, kind);
        Self {
            table,
            kind,
            statements,
        }
    }
}

/// Local store over one logical table
///
/// Cloning shares the configuration and the write lock, so clones count as
/// the same store instance.
pub struct LocalStore<E: Entity> {
    pool: SqlitePool,
    config: Arc<StoreConfig>,
    write_lock: Arc<Mutex<()>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for LocalStore<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            config: Arc::clone(&self.config),
            write_lock: Arc::clone(&self.write_lock),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> LocalStore<E> {
    /// Create a store; the configuration is fixed from here on
    pub fn new(pool: SqlitePool, config: StoreConfig) -> Self {
        debug_assert_eq!(config.kind, E::KIND);
        Self {
            pool,
            config: Arc::new(config),
            write_lock: Arc::new(Mutex::new(())),
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    /// Get one entity by id
    ///
    /// # Returns
    /// The entity, or `None` if no row matches or the read failed
    pub async fn find_by_id(&self, id: E::Id) -> Option<E> {
        let query = sqlx::query(&self.config.statements.select_by_id).bind(id);
        self.fetch_optional(query, "select_by_id").await
    }

    /// Get every entity in storage order
    ///
    /// A failed read returns an empty list.
    pub async fn find_all(&self) -> Vec<E> {
        let query = sqlx::query(&self.config.statements.select_all);
        self.fetch_all(query, "select_all").await
    }

    /// Number of rows in the table, 0 if the read failed
    pub async fn count(&self) -> i64 {
        let started = Instant::now();
        let result = sqlx::query_scalar::<_, i64>(&self.config.statements.count)
            .fetch_one(&self.pool)
            .await;
        observe_db_query("count", self.table(), result.is_ok(), started.elapsed());

        result.unwrap_or_else(|e| {
            tracing::error!(table = %self.table(), error = %e, "Count failed");
            0
        })
    }

    /// Run a single-row read with the fail-soft policy
    pub(crate) async fn fetch_optional(
        &self,
        query: SqliteQuery<'_>,
        operation: &'static str,
    ) -> Option<E> {
        let started = Instant::now();
        let result = query.fetch_optional(&self.pool).await;
        observe_db_query(operation, self.table(), result.is_ok(), started.elapsed());

        match result {
            Ok(row) => row.as_ref().map(E::from_row),
            Err(e) => {
                tracing::error!(
                    table = %self.table(),
                    operation,
                    error = %e,
                    "Read failed, treating as not found"
                );
                None
            }
        }
    }

    /// Run a multi-row read with the fail-soft policy
    pub(crate) async fn fetch_all(&self, query: SqliteQuery<'_>, operation: &'static str) -> Vec<E> {
        let started = Instant::now();
        let result = query.fetch_all(&self.pool).await;
        observe_db_query(operation, self.table(), result.is_ok(), started.elapsed());

        match result {
            Ok(rows) => rows.iter().map(E::from_row).collect(),
            Err(e) => {
                tracing::error!(
                    table = %self.table(),
                    operation,
                    error = %e,
                    "Read failed, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Start a write transaction on a dedicated connection
    ///
    /// Only one transaction may be open per store instance. The connection is
    /// released by `commit`, `rollback` or dropping the handle (which rolls
    /// back).
    ///
    /// # Errors
    /// `TransactionInProgress` if this store already has an open transaction,
    /// `Database` if no connection could be acquired
    pub async fn begin_transaction(&self) -> Result<StoreTransaction<E>, AppError> {
        let guard = Arc::clone(&self.write_lock)
            .try_lock_owned()
            .map_err(|_| AppError::TransactionInProgress(self.config.table.clone()))?;

        let tx = self.pool.begin().await.map_err(|e| {
            tracing::error!(table = %self.table(), error = %e, "Failed to begin transaction");
            AppError::from(e)
        })?;

        tracing::debug!(table = %self.table(), "Transaction started");

        Ok(StoreTransaction {
            tx,
            config: Arc::clone(&self.config),
            aborted: None,
            _guard: guard,
            _entity: PhantomData,
        })
    }
}

/// Write session bound to one connection
///
/// Statements run strictly in submission order. After the first failure the
/// transaction refuses further writes and `commit` rolls back.
pub struct StoreTransaction<E: Entity> {
    tx: Transaction<'static, Sqlite>,
    config: Arc<StoreConfig>,
    aborted: Option<String>,
    _guard: OwnedMutexGuard<()>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> StoreTransaction<E> {
    pub fn table(&self) -> &str {
        &self.config.table
    }

    /// Whether an earlier statement failed
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Execute one statement inside the transaction
    pub(crate) async fn execute(
        &mut self,
        query: SqliteQuery<'_>,
        operation: &'static str,
    ) -> Result<u64, AppError> {
        if let Some(reason) = &self.aborted {
            return Err(AppError::TransactionAborted(reason.clone()));
        }

        let started = Instant::now();
        let result = query.execute(&mut *self.tx).await;
        observe_db_query(operation, &self.config.table, result.is_ok(), started.elapsed());

        match result {
            Ok(done) => Ok(done.rows_affected()),
            Err(e) => {
                tracing::error!(
                    table = %self.config.table,
                    operation,
                    error = %e,
                    "Statement failed, aborting transaction"
                );
                self.aborted = Some(format!("{operation} on {}: {e}", self.config.table));
                Err(AppError::Database(e))
            }
        }
    }

    /// Insert one entity
    pub async fn save(&mut self, entity: &E) -> Result<(), AppError> {
        let config = Arc::clone(&self.config);
        let query = entity.bind_columns(sqlx::query(&config.statements.insert).bind(entity.id()));
        self.execute(query, "insert").await?;
        Ok(())
    }

    /// Insert a batch, one freshly bound statement per entity
    pub async fn save_all(&mut self, entities: &[E]) -> Result<(), AppError> {
        for entity in entities {
            self.save(entity).await?;
        }
        Ok(())
    }

    /// Rewrite one entity's columns
    ///
    /// # Returns
    /// `true` if a row with the entity's id existed
    pub async fn update(&mut self, entity: &E) -> Result<bool, AppError> {
        let config = Arc::clone(&self.config);
        let query = entity
            .bind_columns(sqlx::query(&config.statements.update))
            .bind(entity.id());
        Ok(self.execute(query, "update").await? > 0)
    }

    pub async fn update_all(&mut self, entities: &[E]) -> Result<(), AppError> {
        for entity in entities {
            self.update(entity).await?;
        }
        Ok(())
    }

    /// Delete one entity by its id
    pub async fn delete(&mut self, entity: &E) -> Result<bool, AppError> {
        let config = Arc::clone(&self.config);
        let query = sqlx::query(&config.statements.delete).bind(entity.id());
        Ok(self.execute(query, "delete").await? > 0)
    }

    pub async fn delete_all_of(&mut self, entities: &[E]) -> Result<(), AppError> {
        for entity in entities {
            self.delete(entity).await?;
        }
        Ok(())
    }

    /// Truncate the table
    pub async fn delete_all(&mut self) -> Result<u64, AppError> {
        let config = Arc::clone(&self.config);
        self.execute(sqlx::query(&config.statements.delete_all), "delete_all")
            .await
    }

    /// Make every write visible and release the connection
    ///
    /// # Errors
    /// `TransactionAborted` if any statement failed; the transaction is rolled
    /// back in that case
    pub async fn commit(self) -> Result<(), AppError> {
        let table = self.config.table.clone();

        if let Some(reason) = self.aborted {
            self.tx.rollback().await?;
            DB_TRANSACTIONS_TOTAL
                .with_label_values(&[&table, "aborted"])
                .inc();
            tracing::warn!(table = %table, reason = %reason, "Commit refused, rolled back");
            return Err(AppError::TransactionAborted(reason));
        }

        self.tx.commit().await.map_err(|e| {
            tracing::error!(table = %table, error = %e, "Commit failed");
            AppError::from(e)
        })?;
        DB_TRANSACTIONS_TOTAL
            .with_label_values(&[&table, "committed"])
            .inc();
        tracing::debug!(table = %table, "Transaction committed");

        Ok(())
    }

    /// Discard every write and release the connection
    pub async fn rollback(self) -> Result<(), AppError> {
        let table = self.config.table.clone();
        self.tx.rollback().await?;
        DB_TRANSACTIONS_TOTAL
            .with_label_values(&[&table, "rolled_back"])
            .inc();
        tracing::debug!(table = %table, "Transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_bind_id_first_on_insert_and_last_on_update() {
        let statements = Statements::for_table("users", EntityKind::User);

        assert_eq!(
            statements.insert,
            "INSERT INTO users (id, name, screen_name, profile_image_url, profile_banner_url, url, description, location) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        );
        assert_eq!(
            statements.update,
            "UPDATE users SET name = ?, screen_name = ?, profile_image_url = ?, profile_banner_url = ?, url = ?, description = ?, location = ? WHERE id = ?"
        );
        assert_eq!(statements.delete_all, "DELETE FROM users");
    }
}
