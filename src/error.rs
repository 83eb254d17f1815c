//! Error types for twittcache
//!
//! Local storage, remote service and cache tier failures all convert to
//! `AppError`. Most of them are recovered at the call site (logged and
//! degraded to "absent"); the ones that reach callers are write-transaction
//! failures, configuration problems and typed remote errors.

use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// SQLite failure: I/O, malformed statement or constraint violation
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error (disk cache, database directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error while fetching a blob
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Failure reported by the remote Twitter client
    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    /// Network reported as unreachable by the connectivity check
    #[error("Network unavailable")]
    Offline,

    /// A write transaction is already open on this store instance
    #[error("A transaction is already open on table {0}")]
    TransactionInProgress(String),

    /// An earlier statement failed; nothing from this transaction is kept
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// Schema script could not be applied
    #[error("Schema error: {0}")]
    Schema(String),

    /// Payload is not an image we know how to decode
    #[error("Unsupported image payload: {0}")]
    Decode(String),

    /// Cache key that is not a content key
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    /// Malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON (de)serialization of a persisted record
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short label used for the error metric
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Io(_) => "io",
            AppError::HttpClient(_) => "http_client",
            AppError::Remote(_) => "remote",
            AppError::Offline => "offline",
            AppError::TransactionInProgress(_) => "transaction_in_progress",
            AppError::TransactionAborted(_) => "transaction_aborted",
            AppError::Schema(_) => "schema",
            AppError::Decode(_) => "decode",
            AppError::InvalidKey(_) => "invalid_key",
            AppError::InvalidUrl(_) => "invalid_url",
            AppError::Serialization(_) => "serialization",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// Count this error in the error metric and hand it back
    pub fn recorded(self, source: &str) -> Self {
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL
            .with_label_values(&[self.error_type(), source])
            .inc();
        self
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Typed failure of the remote Twitter client
///
/// Cloned into fallback results so the caller can both show cached data and
/// tell the user why it is stale.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("request timed out")]
    Timeout,

    #[error("authentication rejected")]
    Unauthorized,

    #[error("rate limit exceeded (resets in {reset_in_seconds:?}s)")]
    RateLimited { reset_in_seconds: Option<u64> },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("service error {code}: {message}")]
    Service { code: i32, message: String },

    #[error("network failure: {0}")]
    Network(String),
}

impl RemoteError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited { .. } => "rate_limited",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Service { .. } => "service",
            Self::Network(_) => "network",
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
