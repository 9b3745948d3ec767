use anyhow::{Context, Result};
use clap::Parser;
use relevance_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use relevance_server::config::{AppConfig, CliConfig, FileConfig};
use relevance_server::refresh::{MutationWatcher, RefreshScheduler};
use relevance_server::search::CatalogSearchService;
use relevance_server::server::{metrics, run_server, ServerState};
use relevance_server::server_store::{ServerStore, SqliteServerStore};
use relevance_server::signal_store::SqliteSignalStore;
use relevance_server::telemetry::{Telemetry, TracingAnalyticsSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the catalog, signals and server SQLite databases.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Optional TOML config file; its values override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// Seconds between refresh dispatch ticks.
    #[clap(long, default_value_t = 60)]
    pub dispatch_interval_secs: u64,

    /// Number of days to retain audit entries before pruning. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 30)]
    pub audit_retention_days: u64,

    /// Interval in hours between pruning runs. Only used if audit_retention_days > 0.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = AppConfig::resolve(
        &CliConfig {
            db_dir: cli_args.db_dir,
            port: cli_args.port,
            dispatch_interval_secs: cli_args.dispatch_interval_secs,
            audit_retention_days: cli_args.audit_retention_days,
            prune_interval_hours: cli_args.prune_interval_hours,
        },
        file_config,
    )?;

    info!("Opening SQLite databases in {:?}...", config.db_dir);
    let catalog_store = Arc::new(SqliteCatalogStore::new(config.catalog_db_path())?);
    let signal_store = Arc::new(SqliteSignalStore::new(config.signals_db_path())?);
    let server_store = Arc::new(SqliteServerStore::new(config.server_db_path())?);

    info!("Initializing metrics...");
    metrics::init_metrics();
    metrics::init_catalog_metrics(
        catalog_store.release_count().unwrap_or(0),
        catalog_store.track_count().unwrap_or(0),
    );

    let telemetry = Telemetry::spawn(server_store.clone(), Arc::new(TracingAnalyticsSink));

    let scheduler = Arc::new(RefreshScheduler::new(telemetry.clone()));
    let watcher = Arc::new(MutationWatcher::new(
        scheduler.clone(),
        catalog_store.clone() as Arc<dyn CatalogStore>,
        telemetry.clone(),
        config.dispatch_interval,
    ));

    // Wire the write path to the watcher and start its run loop.
    let (write_tx, write_rx) = tokio::sync::mpsc::unbounded_channel();
    catalog_store.set_write_observer(write_tx);

    let shutdown = CancellationToken::new();
    let watcher_handle = tokio::spawn(watcher.clone().run(write_rx, shutdown.child_token()));

    // Spawn background task for audit pruning if enabled
    if config.audit_retention_days > 0 {
        let retention_days = config.audit_retention_days;
        let interval_hours = config.prune_interval_hours;
        let pruning_store = server_store.clone();

        info!(
            "Audit pruning enabled: retaining {} days, pruning every {} hours",
            retention_days, interval_hours
        );

        tokio::spawn(async move {
            let interval = Duration::from_secs(interval_hours * 60 * 60);
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let cutoff =
                    chrono::Utc::now().timestamp() - (retention_days as i64 * 24 * 60 * 60);

                match pruning_store.cleanup_old_audit_entries(cutoff) {
                    Ok(count) => {
                        if count > 0 {
                            info!("Pruned {} old audit entries", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to prune audit entries: {}", e);
                    }
                }
            }
        });
    }

    let search_service = Arc::new(CatalogSearchService::new(
        catalog_store.clone(),
        signal_store,
        telemetry,
    ));

    let state = ServerState {
        search_service,
        scheduler,
        watcher,
        server_store,
    };

    // Cancel everything on ctrl-c.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    info!("Ready to serve at port {}!", config.port);
    let result = run_server(state, config.port, shutdown.clone()).await;

    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), watcher_handle).await;

    result
}
