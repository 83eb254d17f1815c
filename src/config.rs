//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    pub logging: LoggingConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Upper bound on simultaneously open connections
    pub max_connections: u32,
}

/// Image cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Share of available memory given to the memory tier (default: 0.125)
    pub memory_fraction: f64,
    /// Fixed memory-tier budget in bytes; overrides `memory_fraction`
    pub memory_capacity_bytes: Option<u64>,
    /// Directory holding the disk tier
    pub disk_path: PathBuf,
    /// Disk-tier budget in bytes (default: 10 MiB)
    pub disk_capacity_bytes: u64,
}

impl CacheConfig {
    /// Memory-tier budget in bytes
    ///
    /// Uses the explicit override when present, otherwise
    /// `memory_fraction` of the memory currently available to the process.
    pub fn memory_budget(&self) -> u64 {
        if let Some(bytes) = self.memory_capacity_bytes {
            return bytes;
        }

        let mut system = sysinfo::System::new();
        system.refresh_memory();
        let available = system.available_memory();
        let budget = (available as f64 * self.memory_fraction) as u64;

        tracing::debug!(available, budget, "Computed memory tier budget");
        budget.max(MIN_MEMORY_BUDGET)
    }
}

/// Floor for the computed memory budget, for hosts that report no memory
const MIN_MEMORY_BUDGET: u64 = 1024 * 1024;

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

/// Consumer credentials bundled with the application
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OAuthConfig {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
}

/// Timeline configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TimelineConfig {
    /// Saved search backing the fixed-query timeline
    pub fixed_query: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> String {
        format!("twittcache={},sqlx=warn", self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (TWITTCACHE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("database.path", "data/twittcache.db")?
            .set_default("database.max_connections", 4)?
            .set_default("cache.memory_fraction", 0.125)?
            .set_default("cache.disk_path", "data/images")?
            .set_default("cache.disk_capacity_bytes", 10 * 1024 * 1024)?
            .set_default("http.user_agent", "twittcache/0.1.0")?
            .set_default("http.timeout_seconds", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("TWITTCACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        let fraction = self.cache.memory_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(crate::error::AppError::Config(format!(
                "cache.memory_fraction must be in (0, 1], got {fraction}"
            )));
        }

        if self.cache.disk_capacity_bytes == 0 {
            return Err(crate::error::AppError::Config(
                "cache.disk_capacity_bytes must be greater than 0".to_string(),
            ));
        }

        if self.http.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "http.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(crate::error::AppError::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of {}, got {}",
                LEVELS.join(", "),
                self.logging.level
            )));
        }

        if !matches!(self.logging.format.to_ascii_lowercase().as_str(), "pretty" | "json") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be pretty or json, got {}",
                self.logging.format
            )));
        }

        if self.oauth.consumer_key.is_none() || self.oauth.consumer_secret.is_none() {
            tracing::warn!("OAuth consumer credentials are not configured; login is unavailable");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/twittcache-test.db"),
                max_connections: 4,
            },
            cache: CacheConfig {
                memory_fraction: 0.125,
                memory_capacity_bytes: None,
                disk_path: PathBuf::from("/tmp/twittcache-images"),
                disk_capacity_bytes: 10 * 1024 * 1024,
            },
            http: HttpConfig {
                user_agent: "twittcache-test".to_string(),
                timeout_seconds: 30,
            },
            oauth: OAuthConfig {
                consumer_key: Some("key".to_string()),
                consumer_secret: Some("secret".to_string()),
            },
            timeline: TimelineConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_memory_fraction() {
        for fraction in [0.0, -0.5, 1.5, f64::NAN] {
            let mut config = valid_config();
            config.cache.memory_fraction = fraction;

            let error = config
                .validate()
                .expect_err("memory fraction outside (0, 1] must fail");
            assert!(matches!(
                error,
                crate::error::AppError::Config(message)
                    if message.contains("cache.memory_fraction")
            ));
        }
    }

    #[test]
    fn validate_rejects_empty_disk_budget() {
        let mut config = valid_config();
        config.cache.disk_capacity_bytes = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_memory_budget_wins() {
        let mut config = valid_config();
        config.cache.memory_capacity_bytes = Some(4096);

        assert_eq!(config.cache.memory_budget(), 4096);
    }

    #[test]
    fn computed_memory_budget_is_never_below_floor() {
        let config = valid_config();
        assert!(config.cache.memory_budget() >= MIN_MEMORY_BUDGET);
    }

    #[test]
    fn logging_settings_drive_the_subscriber() {
        let mut config = valid_config();
        config.logging.level = "debug".to_string();
        config.logging.format = "JSON".to_string();

        assert!(config.validate().is_ok());
        assert_eq!(config.logging.default_filter(), "twittcache=debug,sqlx=warn");
        assert!(config.logging.is_json());
        assert!(!valid_config().logging.is_json());
    }

    #[test]
    fn validate_rejects_unknown_logging_settings() {
        let mut config = valid_config();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
