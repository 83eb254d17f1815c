//! Account service
//!
//! User lookup with the cached-user table as offline fallback, plus the login
//! and logout transitions of the session.

use std::sync::Arc;

use super::remote::{Connectivity, RemoteClient};
use super::timeline::Origin;
use crate::data::{Database, Session, StoreFactory, User, UserStore};
use crate::error::{AppError, RemoteError};
use crate::metrics::REMOTE_REQUESTS_TOTAL;
use crate::storage::ImageCache;

/// Result of a user lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLookup {
    pub user: Option<User>,
    pub origin: Origin,
    pub remote_error: Option<RemoteError>,
}

/// Account service
pub struct AccountService {
    remote: Arc<dyn RemoteClient>,
    connectivity: Arc<dyn Connectivity>,
    db: Arc<Database>,
    stores: StoreFactory,
    users: UserStore,
    images: Arc<ImageCache>,
}

impl AccountService {
    /// Create new account service
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        connectivity: Arc<dyn Connectivity>,
        db: Arc<Database>,
        stores: StoreFactory,
        images: Arc<ImageCache>,
    ) -> Self {
        let users = stores.users();
        Self {
            remote,
            connectivity,
            db,
            stores,
            users,
            images,
        }
    }

    /// Look up a user by handle
    ///
    /// Online, the remote answer replaces whatever was cached for that id or
    /// handle. Offline or on a remote failure the cached row is returned.
    pub async fn lookup_user(&self, screen_name: &str) -> UserLookup {
        if !self.connectivity.is_network_available() {
            return UserLookup {
                user: self.users.find_by_screen_name(screen_name).await,
                origin: Origin::Cache,
                remote_error: None,
            };
        }

        match self.remote.show_user(screen_name).await {
            Ok(user) => {
                REMOTE_REQUESTS_TOTAL
                    .with_label_values(&["show_user", "ok"])
                    .inc();
                if let Err(e) = self.cache_user(&user).await {
                    let e = e.recorded("account_service");
                    tracing::warn!(screen_name, error = %e, "Failed to cache user");
                }
                UserLookup {
                    user: Some(user),
                    origin: Origin::Remote,
                    remote_error: None,
                }
            }
            Err(remote_error) => {
                REMOTE_REQUESTS_TOTAL
                    .with_label_values(&["show_user", remote_error.kind()])
                    .inc();
                tracing::warn!(
                    screen_name,
                    error = %remote_error,
                    "User lookup failed, serving cached user"
                );
                UserLookup {
                    user: self.users.find_by_screen_name(screen_name).await,
                    origin: Origin::Cache,
                    remote_error: Some(remote_error),
                }
            }
        }
    }

    /// Record a finished OAuth exchange
    ///
    /// The session is persisted first; caching the account row is best
    /// effort.
    pub async fn complete_login(
        &self,
        session: &mut Session,
        access_token: String,
        access_token_secret: String,
        user: User,
    ) -> Result<(), AppError> {
        session
            .login(&self.db, access_token, access_token_secret, user.clone())
            .await?;

        if let Err(e) = self.cache_user(&user).await {
            tracing::warn!(user_id = user.id, error = %e, "Failed to cache logged-in user");
        }
        Ok(())
    }

    /// Forget the session and every cached row and image
    pub async fn logout(&self, session: &mut Session) -> Result<(), AppError> {
        session.logout(&self.db).await?;
        self.stores.clear_all().await?;
        self.images.clear().await?;
        tracing::info!("Session and caches cleared");
        Ok(())
    }

    /// Replace the cached row for this user
    ///
    /// A stale row holding the same handle under another id is removed too,
    /// since handles are unique.
    async fn cache_user(&self, user: &User) -> Result<(), AppError> {
        let stale = match user.screen_name.as_deref() {
            Some(screen_name) => self
                .users
                .find_by_screen_name(screen_name)
                .await
                .filter(|cached| cached.id != user.id),
            None => None,
        };

        let mut tx = self.users.begin_transaction().await?;
        if let Some(stale) = &stale {
            tx.delete(stale).await?;
        }
        tx.delete(user).await?;
        tx.save(user).await?;
        tx.commit().await
    }
}
