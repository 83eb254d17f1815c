//! Data models
//!
//! Read-only in-memory representations of cached rows. Each read builds a
//! fresh value; nothing here is shared or mutated after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier used when a row carries no usable id
pub const NO_ID: i64 = -1;

// =============================================================================
// User
// =============================================================================

/// A Twitter account
///
/// Text fields are optional because the same mapping reads rows from tables
/// that do not carry every column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Display name
    pub name: Option<String>,
    /// Handle, unique per remote service
    pub screen_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub profile_banner_url: Option<String>,
    /// Personal URL
    pub url: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl User {
    /// A user with only id and handle known
    pub fn new(id: i64, screen_name: impl Into<String>) -> Self {
        Self {
            id,
            name: None,
            screen_name: Some(screen_name.into()),
            profile_image_url: None,
            profile_banner_url: None,
            url: None,
            description: None,
            location: None,
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// A tweet
///
/// Immutable once fetched; a refresh replaces the cached row wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Assigned by the remote service
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
    /// Author, stored alongside the status row
    pub user: User,
}

impl Status {
    pub fn new(id: i64, created_at: DateTime<Utc>, text: impl Into<String>, user: User) -> Self {
        Self {
            id,
            created_at: Some(created_at),
            text: Some(text.into()),
            user,
        }
    }
}
