//! Server settings.
//!
//! Sources, lowest to highest precedence: built-in defaults, a TOML file
//! (`--config`), then command-line flags and their environment variables.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use hotel_tax_core::db::DbConfig;
use serde::Deserialize;

/// HTTP API for hotel tax configuration, exemptions, calculations and
/// reports.
#[derive(Debug, Default, Parser)]
#[command(version)]
pub struct Cli {
    /// TOML settings file.
    #[arg(long, env = "HOTEL_TAX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. `0.0.0.0:8080`.
    #[arg(long, env = "HOTEL_TAX_BIND")]
    pub bind: Option<SocketAddr>,

    /// Database backend to use.
    #[arg(long, env = "HOTEL_TAX_DB_BACKEND")]
    pub backend: Option<String>,

    /// Database connection string.
    /// For SQLite this is a file path (e.g. `hotel_tax.db`) or `:memory:`.
    #[arg(long, env = "HOTEL_TAX_DATABASE")]
    pub database: Option<String>,

    /// Bearer token required on every route except `/health`.
    #[arg(long, env = "HOTEL_TAX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Log level or EnvFilter directive. Ignored when `RUST_LOG` is set.
    #[arg(long, env = "HOTEL_TAX_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Append log output to this file as well as stdout.
    #[arg(long, env = "HOTEL_TAX_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Directory of `.sql` seed files applied after migrations.
    #[arg(long, env = "HOTEL_TAX_SEEDS_DIR")]
    pub seeds_dir: Option<PathBuf>,
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub database: DbConfig,
    pub auth_token: Option<String>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub seeds_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database: DbConfig {
                backend: "sqlite".to_string(),
                connection_string: "hotel_tax.db".to_string(),
            },
            auth_token: None,
            log_level: "info".to_string(),
            log_file: None,
            seeds_dir: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("database", &self.database)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .field("seeds_dir", &self.seeds_dir)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid server configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file '{}'", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("in config file '{}'", path.display()))
    }

    /// Defaults, then the TOML file named by `--config`, then flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        let base = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(cli))
    }

    fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(bind) = cli.bind {
            self.bind = bind;
        }
        if let Some(backend) = &cli.backend {
            self.database.backend = backend.clone();
        }
        if let Some(database) = &cli.database {
            self.database.connection_string = database.clone();
        }
        if let Some(token) = &cli.token {
            self.auth_token = Some(token.clone());
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        if let Some(file) = &cli.log_file {
            self.log_file = Some(file.clone());
        }
        if let Some(dir) = &cli.seeds_dir {
            self.seeds_dir = Some(dir.clone());
        }
        // An empty token would accept `Authorization: Bearer `.
        if self.auth_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.auth_token = None;
        }
        self
    }
}
