//! Status service
//!
//! Write-through actions on the remote service. Nothing is cached here; the
//! next timeline refresh picks the results up.

use std::sync::Arc;

use super::remote::{Connectivity, RemoteClient};
use crate::data::Status;
use crate::error::{AppError, RemoteError};
use crate::metrics::REMOTE_REQUESTS_TOTAL;

/// Status service
pub struct StatusService {
    remote: Arc<dyn RemoteClient>,
    connectivity: Arc<dyn Connectivity>,
}

impl StatusService {
    /// Create new status service
    pub fn new(remote: Arc<dyn RemoteClient>, connectivity: Arc<dyn Connectivity>) -> Self {
        Self {
            remote,
            connectivity,
        }
    }

    /// Post a new status
    ///
    /// # Errors
    /// `Offline` when the network is down, `Remote` when the service refuses
    pub async fn post(&self, text: &str) -> Result<Status, AppError> {
        self.ensure_online()?;
        let result = self.remote.update_status(text).await;
        let status = observed("update_status", result)?;
        tracing::info!(status_id = status.id, "Status posted");
        Ok(status)
    }

    /// Favorite a status
    pub async fn favorite(&self, status_id: i64) -> Result<Status, AppError> {
        self.ensure_online()?;
        let result = self.remote.favorite(status_id).await;
        observed("favorite", result)
    }

    /// Retweet a status
    pub async fn retweet(&self, status_id: i64) -> Result<Status, AppError> {
        self.ensure_online()?;
        let result = self.remote.retweet(status_id).await;
        observed("retweet", result)
    }

    fn ensure_online(&self) -> Result<(), AppError> {
        if self.connectivity.is_network_available() {
            Ok(())
        } else {
            Err(AppError::Offline)
        }
    }
}

fn observed<T>(operation: &str, result: Result<T, RemoteError>) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            REMOTE_REQUESTS_TOTAL
                .with_label_values(&[operation, "ok"])
                .inc();
            Ok(value)
        }
        Err(e) => {
            REMOTE_REQUESTS_TOTAL
                .with_label_values(&[operation, e.kind()])
                .inc();
            tracing::warn!(operation, error = %e, "Remote action failed");
            Err(AppError::from(e).recorded("status_service"))
        }
    }
}
