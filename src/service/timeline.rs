//! Timeline service
//!
//! Offline-mirror orchestration: refresh a timeline from the remote client
//! when the network is up and replace the cached generation, otherwise serve
//! what is cached.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::remote::{Connectivity, RemoteClient};
use crate::data::{
    Database, ListTimelineStore, Session, Status, StoreFactory, Timeline, TimelineStore,
};
use crate::error::{AppError, RemoteError};
use crate::metrics::REMOTE_REQUESTS_TOTAL;

/// Which timeline to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineRequest {
    Home,
    Mentions,
    /// The logged-in user's own posts
    User,
    /// The configured saved search
    FixedQuery,
    /// Ad hoc search; remembered as the session's last query
    Query(String),
    /// A remote list
    List(i64),
}

impl TimelineRequest {
    fn operation(&self) -> &'static str {
        match self {
            Self::Home => "home_timeline",
            Self::Mentions => "mentions_timeline",
            Self::User => "user_timeline",
            Self::FixedQuery | Self::Query(_) => "search",
            Self::List(_) => "list_timeline",
        }
    }
}

/// Where the returned statuses came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Remote,
    Cache,
}

/// Result of a timeline load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub statuses: Vec<Status>,
    pub origin: Origin,
    /// Set when a remote refresh was attempted and failed
    pub remote_error: Option<RemoteError>,
}

impl Loaded {
    fn cached(statuses: Vec<Status>, remote_error: Option<RemoteError>) -> Self {
        Self {
            statuses,
            origin: Origin::Cache,
            remote_error,
        }
    }
}

/// Timeline service
pub struct TimelineService {
    remote: Arc<dyn RemoteClient>,
    connectivity: Arc<dyn Connectivity>,
    db: Arc<Database>,
    timelines: HashMap<Timeline, TimelineStore>,
    lists: ListTimelineStore,
    fixed_query: Option<String>,
}

impl TimelineService {
    /// Create new timeline service
    ///
    /// # Arguments
    /// * `fixed_query` - Saved search backing `TimelineRequest::FixedQuery`
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        connectivity: Arc<dyn Connectivity>,
        db: Arc<Database>,
        stores: &StoreFactory,
        fixed_query: Option<String>,
    ) -> Self {
        let timelines = Timeline::ALL
            .into_iter()
            .map(|timeline| (timeline, stores.timeline(timeline)))
            .collect();

        Self {
            remote,
            connectivity,
            db,
            timelines,
            lists: stores.list_timeline(),
            fixed_query,
        }
    }

    /// Load a timeline
    ///
    /// * Network down: the cached rows, `Origin::Cache`.
    /// * Remote fetch succeeds: the cached generation is replaced in one
    ///   transaction and the fresh rows are returned with `Origin::Remote`.
    ///   A failed cache write is logged only.
    /// * Remote fetch fails: the cached rows plus the remote error.
    pub async fn load(&self, request: TimelineRequest, session: &mut Session) -> Loaded {
        if let TimelineRequest::Query(query) = &request {
            if let Err(e) = session.set_last_query(&self.db, query).await {
                tracing::warn!(error = %e, "Failed to remember last query");
            }
        }

        if !self.connectivity.is_network_available() {
            tracing::debug!(request = ?request, "Network unavailable, serving cached timeline");
            return Loaded::cached(self.cached(&request).await, None);
        }

        let Some(fetched) = self.fetch_remote(&request, session).await else {
            return Loaded::cached(self.cached(&request).await, None);
        };

        match fetched {
            Ok(statuses) => {
                REMOTE_REQUESTS_TOTAL
                    .with_label_values(&[request.operation(), "ok"])
                    .inc();

                if let Err(e) = self.replace_cached(&request, &statuses).await {
                    let e = e.recorded("timeline_service");
                    tracing::warn!(
                        request = ?request,
                        error = %e,
                        "Failed to cache fetched timeline"
                    );
                }

                tracing::debug!(request = ?request, count = statuses.len(), "Timeline refreshed");
                Loaded {
                    statuses,
                    origin: Origin::Remote,
                    remote_error: None,
                }
            }
            Err(remote_error) => {
                REMOTE_REQUESTS_TOTAL
                    .with_label_values(&[request.operation(), remote_error.kind()])
                    .inc();
                tracing::warn!(
                    request = ?request,
                    error = %remote_error,
                    "Remote refresh failed, serving cached timeline"
                );
                Loaded::cached(self.cached(&request).await, Some(remote_error))
            }
        }
    }

    /// Run `load` on a background task
    pub fn spawn_load(
        self: Arc<Self>,
        request: TimelineRequest,
        session: Arc<Mutex<Session>>,
    ) -> JoinHandle<Loaded> {
        tokio::spawn(async move {
            let mut session = session.lock().await;
            self.load(request, &mut session).await
        })
    }

    /// Cached rows only, never touching the network
    pub async fn cached(&self, request: &TimelineRequest) -> Vec<Status> {
        match request {
            TimelineRequest::List(list_id) => self.lists.fetch_by_list_id(*list_id).await,
            other => match self.store_for(other) {
                Some(store) => store.find_all().await,
                None => Vec::new(),
            },
        }
    }

    /// `None` when there is nothing to ask the remote for: no logged-in
    /// handle for the user timeline, or no saved search configured.
    async fn fetch_remote(
        &self,
        request: &TimelineRequest,
        session: &Session,
    ) -> Option<Result<Vec<Status>, RemoteError>> {
        let result = match request {
            TimelineRequest::Home => self.remote.home_timeline().await,
            TimelineRequest::Mentions => self.remote.mentions_timeline().await,
            TimelineRequest::User => {
                let Some(screen_name) = session.screen_name.as_deref() else {
                    tracing::debug!("No logged-in handle, serving cached user timeline");
                    return None;
                };
                self.remote.user_timeline(screen_name).await
            }
            TimelineRequest::FixedQuery => {
                let Some(query) = self.fixed_query.as_deref() else {
                    tracing::debug!("No saved search configured");
                    return None;
                };
                self.remote.search(query).await
            }
            TimelineRequest::Query(query) => self.remote.search(query).await,
            TimelineRequest::List(list_id) => self.remote.list_timeline(*list_id).await,
        };
        Some(result)
    }

    async fn replace_cached(
        &self,
        request: &TimelineRequest,
        statuses: &[Status],
    ) -> Result<(), AppError> {
        if let TimelineRequest::List(list_id) = request {
            let mut tx = self.lists.begin_transaction().await?;
            tx.delete_all_by_list_id(*list_id).await?;
            tx.save(statuses, *list_id).await?;
            return tx.commit().await;
        }

        let Some(store) = self.store_for(request) else {
            return Ok(());
        };
        let mut tx = store.begin_transaction().await?;
        tx.delete_all().await?;
        tx.save_all(statuses).await?;
        tx.commit().await
    }

    fn store_for(&self, request: &TimelineRequest) -> Option<&TimelineStore> {
        let timeline = match request {
            TimelineRequest::Home => Timeline::Home,
            TimelineRequest::Mentions => Timeline::Mentions,
            TimelineRequest::User => Timeline::User,
            TimelineRequest::FixedQuery => Timeline::FixedQuery,
            TimelineRequest::Query(_) => Timeline::Query,
            TimelineRequest::List(_) => return None,
        };
        self.timelines.get(&timeline)
    }
}
