//! Authentication session
//!
//! The session is an explicit value: load it once at start-up, hand it to
//! whatever needs authentication state, persist it after every change and
//! clear it on logout. It lives in the preferences area, apart from the
//! cached-user table.

use super::database::Database;
use super::models::User;
use crate::config::OAuthConfig;
use crate::error::AppError;

const KEY_ACCESS_TOKEN: &str = "oauth_token";
const KEY_ACCESS_TOKEN_SECRET: &str = "oauth_token_secret";
const KEY_LOGGED_IN: &str = "is_logged_in";
const KEY_SCREEN_NAME: &str = "user_screen_name";
const KEY_USER_ID: &str = "user_id";
const KEY_CURRENT_USER: &str = "current_user";
const KEY_LAST_QUERY: &str = "last_query";

const SESSION_KEYS: &[&str] = &[
    KEY_ACCESS_TOKEN,
    KEY_ACCESS_TOKEN_SECRET,
    KEY_LOGGED_IN,
    KEY_SCREEN_NAME,
    KEY_USER_ID,
    KEY_CURRENT_USER,
    KEY_LAST_QUERY,
];

/// Current authentication and session state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Consumer key was bundled with the application
    pub consumer_key_available: bool,
    /// Consumer secret was bundled with the application
    pub consumer_secret_available: bool,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub logged_in: bool,
    pub screen_name: Option<String>,
    pub user_id: Option<i64>,
    /// The authenticated account, as last seen
    pub current_user: Option<User>,
    /// Last ad hoc search
    pub last_query: Option<String>,
}

impl Session {
    /// Load the persisted session
    ///
    /// Consumer credential availability comes from configuration, everything
    /// else from the preferences area. An unreadable current-user record is
    /// logged and dropped.
    pub async fn load(db: &Database, oauth: &OAuthConfig) -> Result<Self, AppError> {
        let current_user = match db.get_preference(KEY_CURRENT_USER).await? {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable current user record");
                    None
                }
            },
            None => None,
        };

        let session = Self {
            consumer_key_available: oauth.consumer_key.is_some(),
            consumer_secret_available: oauth.consumer_secret.is_some(),
            access_token: db.get_preference(KEY_ACCESS_TOKEN).await?,
            access_token_secret: db.get_preference(KEY_ACCESS_TOKEN_SECRET).await?,
            logged_in: db.get_preference(KEY_LOGGED_IN).await?.as_deref() == Some("true"),
            screen_name: db.get_preference(KEY_SCREEN_NAME).await?,
            user_id: db
                .get_preference(KEY_USER_ID)
                .await?
                .and_then(|raw| raw.parse().ok()),
            current_user,
            last_query: db.get_preference(KEY_LAST_QUERY).await?,
        };

        tracing::debug!(
            logged_in = session.logged_in,
            screen_name = ?session.screen_name,
            "Session loaded"
        );

        Ok(session)
    }

    /// Write every session field in one transaction
    pub async fn persist(&self, db: &Database) -> Result<(), AppError> {
        let current_user = self
            .current_user
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        db.write_preferences(&[
            (KEY_ACCESS_TOKEN, self.access_token.clone()),
            (KEY_ACCESS_TOKEN_SECRET, self.access_token_secret.clone()),
            (KEY_LOGGED_IN, Some(self.logged_in.to_string())),
            (KEY_SCREEN_NAME, self.screen_name.clone()),
            (KEY_USER_ID, self.user_id.map(|id| id.to_string())),
            (KEY_CURRENT_USER, current_user),
            (KEY_LAST_QUERY, self.last_query.clone()),
        ])
        .await
    }

    /// Both consumer key and secret are available, so login can start
    pub fn has_consumer_credentials(&self) -> bool {
        self.consumer_key_available && self.consumer_secret_available
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in && self.access_token.is_some() && self.access_token_secret.is_some()
    }

    /// Record a completed login and persist it
    pub async fn login(
        &mut self,
        db: &Database,
        access_token: String,
        access_token_secret: String,
        user: User,
    ) -> Result<(), AppError> {
        self.access_token = Some(access_token);
        self.access_token_secret = Some(access_token_secret);
        self.logged_in = true;
        self.screen_name = user.screen_name.clone();
        self.user_id = Some(user.id);
        self.current_user = Some(user);
        self.persist(db).await?;

        tracing::info!(screen_name = ?self.screen_name, "Logged in");
        Ok(())
    }

    /// Remember the last ad hoc search
    pub async fn set_last_query(&mut self, db: &Database, query: &str) -> Result<(), AppError> {
        self.last_query = Some(query.to_string());
        db.set_preference(KEY_LAST_QUERY, query).await
    }

    /// Forget every authentication detail
    ///
    /// Consumer credential availability is packaging metadata and survives.
    pub async fn logout(&mut self, db: &Database) -> Result<(), AppError> {
        let entries: Vec<(&str, Option<String>)> =
            SESSION_KEYS.iter().map(|key| (*key, None)).collect();
        db.write_preferences(&entries).await?;

        *self = Self {
            consumer_key_available: self.consumer_key_available,
            consumer_secret_available: self.consumer_secret_available,
            ..Self::default()
        };

        tracing::info!("Logged out");
        Ok(())
    }
}
