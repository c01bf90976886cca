//! Configuration file support for the dropsync CLI.
//!
//! Configuration is loaded with the following precedence (highest to
//! lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `DROPSYNC_`, e.g.,
//!    `DROPSYNC_DATABASE_URL`)
//! 3. Config file (~/.config/dropsync/config.toml or ./dropsync.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite:///home/me/.local/share/dropsync/dropsync.db?mode=rwc"
//!
//! [remote]
//! base = "https://api.dropsync.example"
//! token = "ds_live_..."  # or DROPSYNC_REMOTE_TOKEN
//!
//! [sync]
//! rate = 1.8         # requests per second
//! concurrency = 2    # requests in flight
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Remote order API configuration.
    pub remote: RemoteConfig,
    /// Scheduler tuning.
    pub sync: SyncConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL. Defaults to a SQLite file under the
    /// platform data directory.
    pub url: Option<String>,
}

/// Remote order API configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the order API.
    pub base: Option<String>,
    /// Bearer token, if the API requires one.
    pub token: Option<String>,
}

/// Scheduler tuning.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum request rate (requests per second).
    pub rate: f64,
    /// Maximum requests in flight.
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rate: dropsync::scheduler::DEFAULT_REQUESTS_PER_SECOND,
            concurrency: dropsync::scheduler::DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file_path() {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            File::new("dropsync.toml", FileFormat::Toml).required(false),
        );
        builder = builder.add_source(Environment::with_prefix("DROPSYNC").separator("_"));

        builder.build()?.try_deserialize()
    }

    /// The database URL to use, falling back to the platform data
    /// directory.
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database.url {
            return url.clone();
        }
        default_database_url()
    }
}

fn config_file_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "dropsync", "dropsync")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Default SQLite database location under the platform data directory.
///
/// The directory is created if missing so SQLite can create the file.
pub fn default_database_url() -> String {
    let dir = ProjectDirs::from("io", "dropsync", "dropsync")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    if let Err(err) = std::fs::create_dir_all(&dir) {
        tracing::warn!(dir = %dir.display(), error = %err, "could not create data directory");
    }

    format!("sqlite://{}?mode=rwc", dir.join("dropsync.db").display())
}
