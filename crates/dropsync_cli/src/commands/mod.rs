//! CLI command implementations.

pub mod migrate;
pub mod status;
pub mod sync;

use dropsync::{RemoteError, StoreError};

/// Errors surfaced to the terminal by any command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("remote API error: {0}")]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Usage(String),
}

/// Result type alias for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
