//! Row mapping
//!
//! Converts persisted rows into [`Status`] and [`User`] values and binds
//! entity fields back into statements. Column lookup is by name and never
//! fails: a missing column, a NULL or a value of the wrong type reads as
//! `None`, and a missing identifier reads as [`NO_ID`].

use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Decode, Row, Type};

use super::models::{NO_ID, Status, User};
use super::store::Entity;

/// Statement with SQLite arguments, as built by `sqlx::query`
pub type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// The entity kinds the local store knows how to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Status,
    User,
}

const STATUS_COLUMNS: &[&str] = &[
    "created_at",
    "text",
    "user_id",
    "user_name",
    "user_screen_name",
    "user_profile_image_url",
    "user_profile_banner_url",
    "user_url",
    "user_description",
    "user_location",
];

const USER_COLUMNS: &[&str] = &[
    "name",
    "screen_name",
    "profile_image_url",
    "profile_banner_url",
    "url",
    "description",
    "location",
];

impl EntityKind {
    /// Persisted columns other than `id`, in binding order
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::Status => STATUS_COLUMNS,
            EntityKind::User => USER_COLUMNS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Status => "status",
            EntityKind::User => "user",
        }
    }
}

/// Read a column by name, tolerating absence
pub fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Option<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get::<Option<T>, _>(name).ok().flatten()
}

/// Map a row of the `users` table
pub fn map_user(row: &SqliteRow) -> User {
    map_user_prefixed(row, "")
}

/// Map user columns carrying `prefix` (`"user_"` inside timeline rows)
pub fn map_user_prefixed(row: &SqliteRow, prefix: &str) -> User {
    let name = |column_name: &str| format!("{prefix}{column_name}");

    User {
        id: column::<i64>(row, &name("id")).unwrap_or(NO_ID),
        name: column(row, &name("name")),
        screen_name: column(row, &name("screen_name")),
        profile_image_url: column(row, &name("profile_image_url")),
        profile_banner_url: column(row, &name("profile_banner_url")),
        url: column(row, &name("url")),
        description: column(row, &name("description")),
        location: column(row, &name("location")),
    }
}

/// Map a row of any timeline table
pub fn map_status(row: &SqliteRow) -> Status {
    Status {
        id: column::<i64>(row, "id").unwrap_or(NO_ID),
        created_at: column(row, "created_at"),
        text: column(row, "text"),
        user: map_user_prefixed(row, "user_"),
    }
}

impl Entity for Status {
    type Id = i64;
    const KIND: EntityKind = EntityKind::Status;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &SqliteRow) -> Self {
        map_status(row)
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.created_at)
            .bind(&self.text)
            .bind(self.user.id)
            .bind(&self.user.name)
            .bind(&self.user.screen_name)
            .bind(&self.user.profile_image_url)
            .bind(&self.user.profile_banner_url)
            .bind(&self.user.url)
            .bind(&self.user.description)
            .bind(&self.user.location)
    }
}

impl Entity for User {
    type Id = i64;
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &SqliteRow) -> Self {
        map_user(row)
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.name)
            .bind(&self.screen_name)
            .bind(&self.profile_image_url)
            .bind(&self.profile_banner_url)
            .bind(&self.url)
            .bind(&self.description)
            .bind(&self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> sqlx::SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn user_row_missing_columns_maps_to_absent_fields() {
        let pool = memory_pool().await;
        let row = sqlx::query("SELECT 42 AS id, 'jack' AS screen_name")
            .fetch_one(&pool)
            .await
            .unwrap();

        let user = map_user(&row);
        assert_eq!(user.id, 42);
        assert_eq!(user.screen_name.as_deref(), Some("jack"));
        assert_eq!(user.name, None);
        assert_eq!(user.profile_banner_url, None);
        assert_eq!(user.location, None);
    }

    #[tokio::test]
    async fn missing_id_maps_to_sentinel() {
        let pool = memory_pool().await;
        let row = sqlx::query("SELECT 'hello' AS text")
            .fetch_one(&pool)
            .await
            .unwrap();

        let status = map_status(&row);
        assert_eq!(status.id, NO_ID);
        assert_eq!(status.text.as_deref(), Some("hello"));
        assert_eq!(status.created_at, None);
        assert_eq!(status.user.id, NO_ID);
        assert_eq!(status.user.screen_name, None);
    }

    #[tokio::test]
    async fn null_and_mistyped_columns_map_to_absent_fields() {
        let pool = memory_pool().await;
        let row = sqlx::query("SELECT NULL AS id, 12 AS name, NULL AS screen_name")
            .fetch_one(&pool)
            .await
            .unwrap();

        let user = map_user(&row);
        assert_eq!(user.id, NO_ID);
        assert_eq!(user.name, None);
        assert_eq!(user.screen_name, None);
    }

    #[tokio::test]
    async fn status_row_reads_prefixed_author_columns() {
        let pool = memory_pool().await;
        let row = sqlx::query(
            "SELECT 7 AS id, 'hi' AS text, 3 AS user_id, 'Ann' AS user_name, 'ann' AS user_screen_name",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        let status = map_status(&row);
        assert_eq!(status.id, 7);
        assert_eq!(status.user.id, 3);
        assert_eq!(status.user.name.as_deref(), Some("Ann"));
        assert_eq!(status.user.screen_name.as_deref(), Some("ann"));
        assert_eq!(status.user.url, None);
    }

    #[test]
    fn column_lists_match_bound_parameter_count() {
        assert_eq!(EntityKind::Status.columns().len(), 10);
        assert_eq!(EntityKind::User.columns().len(), 7);
    }
}
