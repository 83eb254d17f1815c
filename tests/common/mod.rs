//! Common test utilities for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use twittcache::data::{Status, User};
use twittcache::error::{AppError, RemoteError};
use twittcache::service::{RemoteClient, StaticConnectivity};
use twittcache::storage::ImageFetcher;
use twittcache::{CacheContext, config};

/// 1x1 GIF
pub const TINY_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00\
    \x21\xf9\x04\x01\x00\x00\x00\x00\x2c\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02\x44\x01\x00\x3b";

/// Remote client serving canned data
#[derive(Default)]
pub struct FakeRemote {
    statuses: Mutex<Vec<Status>>,
    users: Mutex<HashMap<String, User>>,
    failure: Mutex<Option<RemoteError>>,
    calls: AtomicUsize,
}

impl FakeRemote {
    pub fn serve(&self, statuses: Vec<Status>) {
        *self.statuses.lock().unwrap() = statuses;
    }

    pub fn add_user(&self, user: User) {
        let screen_name = user.screen_name.clone().unwrap_or_default();
        self.users.lock().unwrap().insert(screen_name, user);
    }

    pub fn fail_with(&self, error: Option<RemoteError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn timeline(&self) -> Result<Vec<Status>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.statuses.lock().unwrap().clone())
    }

    fn single(&self, id: i64) -> Result<Status, RemoteError> {
        self.timeline()?
            .into_iter()
            .find(|status| status.id == id)
            .ok_or(RemoteError::Service {
                code: 144,
                message: "No status found with that ID".to_string(),
            })
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn home_timeline(&self) -> Result<Vec<Status>, RemoteError> {
        self.timeline()
    }

    async fn mentions_timeline(&self) -> Result<Vec<Status>, RemoteError> {
        self.timeline()
    }

    async fn user_timeline(&self, _screen_name: &str) -> Result<Vec<Status>, RemoteError> {
        self.timeline()
    }

    async fn search(&self, _query: &str) -> Result<Vec<Status>, RemoteError> {
        self.timeline()
    }

    async fn list_timeline(&self, _list_id: i64) -> Result<Vec<Status>, RemoteError> {
        self.timeline()
    }

    async fn show_user(&self, screen_name: &str) -> Result<User, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.users
            .lock()
            .unwrap()
            .get(screen_name)
            .cloned()
            .ok_or(RemoteError::Service {
                code: 50,
                message: "User not found".to_string(),
            })
    }

    async fn update_status(&self, text: &str) -> Result<Status, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Status::new(1000, Utc::now(), text, User::new(1, "ferris")))
    }

    async fn favorite(&self, status_id: i64) -> Result<Status, RemoteError> {
        self.single(status_id)
    }

    async fn retweet(&self, status_id: i64) -> Result<Status, RemoteError> {
        self.single(status_id)
    }
}

/// Image fetcher serving a fixed payload and counting requests
pub struct StubFetcher {
    body: Vec<u8>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

/// Cache context over a temporary directory with fake collaborators
pub struct TestContext {
    pub context: CacheContext,
    pub remote: Arc<FakeRemote>,
    pub connectivity: Arc<StaticConnectivity>,
    pub fetcher: Arc<StubFetcher>,
    pub _temp_dir: Arc<TempDir>,
}

impl TestContext {
    /// Create a new test context in a fresh temporary directory
    pub async fn new() -> Self {
        Self::in_dir(Arc::new(TempDir::new().unwrap())).await
    }

    /// Build a context over an existing directory, as after a restart
    pub async fn in_dir(temp_dir: Arc<TempDir>) -> Self {
        let fetcher = Arc::new(StubFetcher::new(TINY_GIF));
        let context = CacheContext::with_fetcher(test_config(temp_dir.path()), fetcher.clone())
            .await
            .unwrap();

        Self {
            context,
            remote: Arc::new(FakeRemote::default()),
            connectivity: Arc::new(StaticConnectivity::new(true)),
            fetcher,
            _temp_dir: temp_dir,
        }
    }

    /// Shut this context down and open a new one over the same files
    pub async fn restart(self) -> Self {
        self.context.shutdown().await;
        Self::in_dir(self._temp_dir).await
    }

    pub fn timelines(&self) -> twittcache::service::TimelineService {
        self.context
            .timeline_service(self.remote.clone(), self.connectivity.clone())
    }

    pub fn accounts(&self) -> twittcache::service::AccountService {
        self.context
            .account_service(self.remote.clone(), self.connectivity.clone())
    }

    pub fn statuses(&self) -> twittcache::service::StatusService {
        self.context
            .status_service(self.remote.clone(), self.connectivity.clone())
    }
}

pub fn test_config(dir: &Path) -> config::AppConfig {
    config::AppConfig {
        database: config::DatabaseConfig {
            path: dir.join("twittcache.db"),
            max_connections: 4,
        },
        cache: config::CacheConfig {
            memory_fraction: 0.125,
            memory_capacity_bytes: Some(1024 * 1024),
            disk_path: dir.join("images"),
            disk_capacity_bytes: 1024 * 1024,
        },
        http: config::HttpConfig {
            user_agent: "twittcache-test".to_string(),
            timeout_seconds: 5,
        },
        oauth: config::OAuthConfig {
            consumer_key: Some("test-consumer-key".to_string()),
            consumer_secret: Some("test-consumer-secret".to_string()),
        },
        timeline: config::TimelineConfig {
            fixed_query: Some("#rustlang".to_string()),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

pub fn user(id: i64, screen_name: &str) -> User {
    User {
        name: Some(format!("User {id}")),
        profile_image_url: Some(format!("https://pbs.example.com/{screen_name}.gif")),
        description: Some("Writes Rust".to_string()),
        ..User::new(id, screen_name)
    }
}

pub fn status(id: i64) -> Status {
    Status::new(
        id,
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap(),
        format!("status number {id}"),
        user(500 + id, &format!("author{id}")),
    )
}
