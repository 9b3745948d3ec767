mod file_config;

pub use file_config::{AuditConfig, FileConfig, RefreshConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub dispatch_interval_secs: u64,
    pub audit_retention_days: u64,
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub dispatch_interval: Duration,
    /// 0 disables audit pruning.
    pub audit_retention_days: u64,
    pub prune_interval_hours: u64,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let refresh = file.refresh.unwrap_or_default();
        let dispatch_interval_secs = refresh
            .dispatch_interval_secs
            .unwrap_or(cli.dispatch_interval_secs);
        if dispatch_interval_secs == 0 {
            bail!("dispatch_interval_secs must be positive");
        }

        let audit = file.audit.unwrap_or_default();
        let audit_retention_days = audit.retention_days.unwrap_or(cli.audit_retention_days);
        let prune_interval_hours = audit
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);

        Ok(Self {
            db_dir,
            port,
            dispatch_interval: Duration::from_secs(dispatch_interval_secs),
            audit_retention_days,
            prune_interval_hours,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn signals_db_path(&self) -> PathBuf {
        self.db_dir.join("signals.db")
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.db_dir.join("server.db")
    }
}
