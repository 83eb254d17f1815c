//! twittcache - Local cache and offline mirror for a Twitter client
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Timeline refresh with cache fallback                     │
//! │  - User lookup, login/logout, status actions                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┴───────────────────┐
//! ┌──────────────────────────────┐ ┌──────────────────────────────┐
//! │         Data Layer            │ │        Image Cache           │
//! │  - SQLite (sqlx)              │ │  - Memory tier (Moka)        │
//! │  - Timeline / user stores     │ │  - Disk tier (files)         │
//! │  - Session (preferences)      │ │  - HTTP fetch (reqwest)      │
//! └──────────────────────────────┘ └──────────────────────────────┘
//! ```
//!
//! The remote REST client and the connectivity check are collaborators
//! supplied by the host application through `service::RemoteClient` and
//! `service::Connectivity`.
//!
//! # Modules
//!
//! - `service`: Orchestration and collaborator traits
//! - `data`: SQLite stores and session
//! - `storage`: Two-tier image cache
//! - `config`: Configuration management
//! - `metrics`: Prometheus instruments
//! - `error`: Error types

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod storage;

use std::sync::Arc;

use tokio::sync::Mutex;

/// Everything the cache core owns, built once at start-up
///
/// Services are created from the context with the host's collaborators.
pub struct CacheContext {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Store factory over `db`
    pub stores: data::StoreFactory,

    /// Image cache (memory + disk)
    pub images: Arc<storage::ImageCache>,

    /// Authentication session, loaded from the preferences area
    pub session: Arc<Mutex<data::Session>>,
}

impl CacheContext {
    /// Initialize the cache context
    ///
    /// # Steps
    /// 1. Connect to SQLite and apply the bundled schema
    /// 2. Build the store factory
    /// 3. Open the image cache with the HTTP fetcher
    /// 4. Load the session
    ///
    /// # Errors
    /// Returns error if the database or the HTTP client cannot be set up.
    /// An unusable disk cache only degrades to memory-only.
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let fetcher = Arc::new(storage::HttpImageFetcher::new(&config.http)?);
        Self::with_fetcher(config, fetcher).await
    }

    /// Same as `new` with a caller-supplied image fetcher
    pub async fn with_fetcher(
        config: config::AppConfig,
        fetcher: Arc<dyn storage::ImageFetcher>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing cache context...");

        // 1. Connect to SQLite database
        let db = data::Database::connect(&config.database.path, config.database.max_connections)
            .await?;

        // 2. Store factory
        let stores = data::StoreFactory::new(&db);

        // 3. Image cache
        let images = storage::ImageCache::open(&config.cache, fetcher).await;
        tracing::info!(
            memory_capacity_bytes = images.memory().capacity_bytes(),
            disk_enabled = images.disk().is_some(),
            "Image cache initialized"
        );

        // 4. Session
        let session = data::Session::load(&db, &config.oauth).await?;

        tracing::info!(
            logged_in = session.is_logged_in(),
            "Cache context initialized successfully"
        );

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            stores,
            images: Arc::new(images),
            session: Arc::new(Mutex::new(session)),
        })
    }

    pub fn timeline_service(
        &self,
        remote: Arc<dyn service::RemoteClient>,
        connectivity: Arc<dyn service::Connectivity>,
    ) -> service::TimelineService {
        service::TimelineService::new(
            remote,
            connectivity,
            Arc::clone(&self.db),
            &self.stores,
            self.config.timeline.fixed_query.clone(),
        )
    }

    pub fn account_service(
        &self,
        remote: Arc<dyn service::RemoteClient>,
        connectivity: Arc<dyn service::Connectivity>,
    ) -> service::AccountService {
        service::AccountService::new(
            remote,
            connectivity,
            Arc::clone(&self.db),
            self.stores.clone(),
            Arc::clone(&self.images),
        )
    }

    pub fn status_service(
        &self,
        remote: Arc<dyn service::RemoteClient>,
        connectivity: Arc<dyn service::Connectivity>,
    ) -> service::StatusService {
        service::StatusService::new(remote, connectivity)
    }

    /// Empty every table and both image tiers; the session is kept
    pub async fn clear_caches(&self) -> Result<(), error::AppError> {
        self.stores.clear_all().await?;
        self.images.clear().await?;
        Ok(())
    }

    /// Log the user out and clear every cache
    pub async fn logout(&self) -> Result<(), error::AppError> {
        let mut session = self.session.lock().await;
        session.logout(&self.db).await?;
        drop(session);
        self.clear_caches().await
    }

    /// Close the database pool
    pub async fn shutdown(&self) {
        self.db.close().await;
        tracing::info!("Cache context shut down");
    }
}
