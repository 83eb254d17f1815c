//! Data layer module
//!
//! Handles all local persistence:
//! - SQLite connection and versioned schema
//! - Row mapping for statuses and users
//! - Generic and specialised stores
//! - Session (preferences area)

mod database;
mod mapping;
mod models;
mod schema;
mod session;
mod store;
mod stores;

pub use database::Database;
pub use mapping::{EntityKind, SqliteQuery, column, map_status, map_user, map_user_prefixed};
pub use models::*;
pub use schema::{BUNDLED as BUNDLED_SCHEMA, SchemaScript};
pub use session::Session;
pub use store::{Entity, LocalStore, Statements, StoreConfig, StoreTransaction};
pub use stores::{
    ListTimelineStore, ListTransaction, StoreFactory, Timeline, TimelineStore, UserStore,
};
