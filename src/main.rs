//! twittcache maintenance binary

use twittcache::{CacheContext, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Maintenance command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Row counts per table and session state
    Stats,
    /// Empty every table and the image cache
    Clear,
    /// Forget the session, then clear
    Logout,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self, String> {
        match arg {
            None | Some("stats") => Ok(Self::Stats),
            Some("clear") => Ok(Self::Clear),
            Some("logout") => Ok(Self::Logout),
            Some(other) => Err(format!(
                "unknown command '{other}' (expected stats, clear or logout)"
            )),
        }
    }
}

/// Install the tracing subscriber described by the logging section
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.default_filter().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the logging section
/// 3. Initialize metrics
/// 4. Build the cache context
/// 5. Run the requested command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let arg = std::env::args().nth(1);
    let command = Command::parse(arg.as_deref())?;

    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    init_tracing(&config.logging);

    // 3. Initialize metrics
    twittcache::metrics::init_metrics();

    tracing::info!(
        database = %config.database.path.display(),
        images = %config.cache.disk_path.display(),
        "Configuration loaded"
    );

    // 4. Build the cache context
    let context = CacheContext::new(config).await?;

    // 5. Run the command
    match command {
        Command::Stats => {
            for (table, rows) in context.stores.table_counts().await {
                tracing::info!(table, rows, "Table");
            }
            if let Some(disk) = context.images.disk() {
                tracing::info!(
                    bytes = disk.size_bytes().await,
                    capacity_bytes = disk.capacity_bytes(),
                    "Disk image cache"
                );
            }
            let session = context.session.lock().await;
            tracing::info!(
                logged_in = session.is_logged_in(),
                screen_name = ?session.screen_name,
                last_query = ?session.last_query,
                consumer_credentials = session.has_consumer_credentials(),
                "Session"
            );
        }
        Command::Clear => {
            context.clear_caches().await?;
            tracing::info!("Caches cleared");
        }
        Command::Logout => {
            context.logout().await?;
            tracing::info!("Logged out");
        }
    }

    context.shutdown().await;
    Ok(())
}
