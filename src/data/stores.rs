//! Specialised stores and the store factory
//!
//! Every timeline table holds the same status layout; the stores differ only
//! in the table they bind to. The list timeline shares one table between all
//! remote lists and scopes its rows by `list_id`.

use std::sync::Arc;

use sqlx::SqlitePool;

use super::database::Database;
use super::mapping::EntityKind;
use super::models::{Status, User};
use super::store::{Entity, LocalStore, StoreConfig, StoreTransaction};
use crate::error::AppError;

/// Store over one of the unscoped timeline tables
pub type TimelineStore = LocalStore<Status>;

/// Store over the cached-user table
pub type UserStore = LocalStore<User>;

const LIST_TIMELINE_TABLE: &str = "list_timeline";
const USERS_TABLE: &str = "users";

/// Unscoped timelines, one backing table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeline {
    /// Home feed
    Home,
    /// Mentions of the current user
    Mentions,
    /// The current user's own posts
    User,
    /// Results of the configured saved search
    FixedQuery,
    /// Results of the last ad hoc search
    Query,
}

impl Timeline {
    pub const ALL: [Timeline; 5] = [
        Timeline::Home,
        Timeline::Mentions,
        Timeline::User,
        Timeline::FixedQuery,
        Timeline::Query,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Timeline::Home => "home_timeline",
            Timeline::Mentions => "mentions_timeline",
            Timeline::User => "user_timeline",
            Timeline::FixedQuery => "fixed_query_timeline",
            Timeline::Query => "query_timeline",
        }
    }
}

impl LocalStore<User> {
    /// Get one user by handle
    pub async fn find_by_screen_name(&self, screen_name: &str) -> Option<User> {
        let sql = format!(
            "SELECT * FROM {} WHERE screen_name = ? COLLATE NOCASE",
            self.table()
        );
        let query = sqlx::query(&sql).bind(screen_name);
        self.fetch_optional(query, "select_by_screen_name").await
    }
}

// =============================================================================
// List timeline
// =============================================================================

#[derive(Debug)]
struct ListStatements {
    insert: String,
    select_by_list: String,
    delete_by_list: String,
}

impl ListStatements {
    fn for_table(table: &str) -> Self {
        let columns = EntityKind::Status.columns();
        let placeholders = vec!["?"; columns.len() + 2].join(", ");

        Self {
            insert: format!(
                "INSERT INTO {table} (id, {}, list_id) VALUES ({placeholders})",
                columns.join(", ")
            ),
            select_by_list: format!("SELECT * FROM {table} WHERE list_id = ?"),
            delete_by_list: format!("DELETE FROM {table} WHERE list_id = ?"),
        }
    }
}

/// Timeline of remote lists, scoped by list id
#[derive(Clone)]
pub struct ListTimelineStore {
    inner: LocalStore<Status>,
    statements: Arc<ListStatements>,
}

impl ListTimelineStore {
    fn new(pool: SqlitePool) -> Self {
        Self {
            inner: LocalStore::new(
                pool,
                StoreConfig::for_table(LIST_TIMELINE_TABLE, EntityKind::Status),
            ),
            statements: Arc::new(ListStatements::for_table(LIST_TIMELINE_TABLE)),
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Option<Status> {
        self.inner.find_by_id(id).await
    }

    /// Rows of every list
    pub async fn find_all(&self) -> Vec<Status> {
        self.inner.find_all().await
    }

    pub async fn count(&self) -> i64 {
        self.inner.count().await
    }

    /// Rows of one list, empty if none are cached or the read failed
    pub async fn fetch_by_list_id(&self, list_id: i64) -> Vec<Status> {
        let query = sqlx::query(&self.statements.select_by_list).bind(list_id);
        self.inner.fetch_all(query, "select_by_list").await
    }

    pub async fn begin_transaction(&self) -> Result<ListTransaction, AppError> {
        Ok(ListTransaction {
            inner: self.inner.begin_transaction().await?,
            statements: Arc::clone(&self.statements),
        })
    }
}

/// Write session on the list timeline
pub struct ListTransaction {
    inner: StoreTransaction<Status>,
    statements: Arc<ListStatements>,
}

impl ListTransaction {
    /// Insert a batch, every row tagged with `list_id`
    pub async fn save(&mut self, statuses: &[Status], list_id: i64) -> Result<(), AppError> {
        let statements = Arc::clone(&self.statements);
        for status in statuses {
            let query = status
                .bind_columns(sqlx::query(&statements.insert).bind(status.id))
                .bind(list_id);
            self.inner.execute(query, "insert_in_list").await?;
        }
        Ok(())
    }

    /// Delete only the rows of `list_id`
    pub async fn delete_all_by_list_id(&mut self, list_id: i64) -> Result<u64, AppError> {
        let statements = Arc::clone(&self.statements);
        let query = sqlx::query(&statements.delete_by_list).bind(list_id);
        self.inner.execute(query, "delete_by_list").await
    }

    /// Delete the rows of every list
    pub async fn delete_all(&mut self) -> Result<u64, AppError> {
        self.inner.delete_all().await
    }

    pub async fn commit(self) -> Result<(), AppError> {
        self.inner.commit().await
    }

    pub async fn rollback(self) -> Result<(), AppError> {
        self.inner.rollback().await
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Builds stores over the shared database
///
/// Each call returns a new store instance with its own write lock.
#[derive(Clone)]
pub struct StoreFactory {
    pool: SqlitePool,
}

impl StoreFactory {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    pub fn timeline(&self, timeline: Timeline) -> TimelineStore {
        LocalStore::new(
            self.pool.clone(),
            StoreConfig::for_table(timeline.table(), EntityKind::Status),
        )
    }

    pub fn list_timeline(&self) -> ListTimelineStore {
        ListTimelineStore::new(self.pool.clone())
    }

    pub fn users(&self) -> UserStore {
        LocalStore::new(
            self.pool.clone(),
            StoreConfig::for_table(USERS_TABLE, EntityKind::User),
        )
    }

    /// Row counts of every logical table, for diagnostics
    pub async fn table_counts(&self) -> Vec<(&'static str, i64)> {
        let mut counts = Vec::with_capacity(Timeline::ALL.len() + 2);
        for timeline in Timeline::ALL {
            counts.push((timeline.table(), self.timeline(timeline).count().await));
        }
        counts.push((LIST_TIMELINE_TABLE, self.list_timeline().count().await));
        counts.push((USERS_TABLE, self.users().count().await));
        counts
    }

    /// Empty every logical table in one transaction
    pub async fn clear_all(&self) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let tables = Timeline::ALL
            .iter()
            .map(|timeline| timeline.table())
            .chain([LIST_TIMELINE_TABLE, USERS_TABLE]);

        for table in tables {
            let sql = format!("DELETE FROM {table}");
            sqlx::query(&sql).execute(&mut *tx).await.map_err(|e| {
                tracing::error!(table, error = %e, "Failed to clear table");
                AppError::from(e)
            })?;
        }

        tx.commit().await?;
        tracing::info!("Local store cleared");
        Ok(())
    }
}
