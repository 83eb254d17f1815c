//! Collaborator seams
//!
//! The REST client and the connectivity check are supplied by the embedding
//! application. This crate only depends on these traits.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::data::{Status, User};
use crate::error::RemoteError;

/// Remote Twitter REST client
///
/// Every call is fallible with a typed `RemoteError`; nothing panics across
/// the async boundary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn home_timeline(&self) -> Result<Vec<Status>, RemoteError>;

    async fn mentions_timeline(&self) -> Result<Vec<Status>, RemoteError>;

    /// Posts of the account with this handle
    async fn user_timeline(&self, screen_name: &str) -> Result<Vec<Status>, RemoteError>;

    async fn search(&self, query: &str) -> Result<Vec<Status>, RemoteError>;

    async fn list_timeline(&self, list_id: i64) -> Result<Vec<Status>, RemoteError>;

    async fn show_user(&self, screen_name: &str) -> Result<User, RemoteError>;

    /// Post a new status and return it as the service stored it
    async fn update_status(&self, text: &str) -> Result<Status, RemoteError>;

    async fn favorite(&self, status_id: i64) -> Result<Status, RemoteError>;

    async fn retweet(&self, status_id: i64) -> Result<Status, RemoteError>;
}

/// "Is the network reachable" check
#[cfg_attr(test, mockall::automock)]
pub trait Connectivity: Send + Sync {
    fn is_network_available(&self) -> bool;
}

/// Connectivity flag set by the host application
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
        tracing::debug!(online, "Connectivity changed");
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for StaticConnectivity {
    fn is_network_available(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}
