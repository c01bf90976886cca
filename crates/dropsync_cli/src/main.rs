//! dropsync CLI - synchronize storefront orders into a local database.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "dropsync")]
#[command(version)]
#[command(about = "Resumable, rate-limited order sync for connected storefronts")]
#[command(after_long_help = r#"EXAMPLES
    Sync a shop's orders (incremental, resumes interrupted runs):
        $ dropsync sync drops.example

    Re-walk the whole collection from the beginning:
        $ dropsync sync drops.example --force

    Show the durable sync state:
        $ dropsync status drops.example

CONFIGURATION
    dropsync reads configuration from:
      1. ~/.config/dropsync/config.toml (or $XDG_CONFIG_HOME/dropsync/config.toml)
      2. ./dropsync.toml
      3. Environment variables (DROPSYNC_* prefix)

ENVIRONMENT VARIABLES
    DROPSYNC_DATABASE_URL   Database connection string
    DROPSYNC_REMOTE_BASE    Base URL of the order API
    DROPSYNC_REMOTE_TOKEN   Bearer token for the order API
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize a shop's orders
    Sync {
        /// Shop domain to sync
        shop: String,
        /// Discard prior progress and walk the full collection
        #[arg(long)]
        force: bool,
    },
    /// Show the durable sync state for a shop
    Status {
        /// Shop domain to inspect
        shop: String,
    },
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = async {
        let config = Config::load()?;
        match cli.command {
            Commands::Sync { shop, force } => commands::sync::run(&config, &shop, force).await,
            Commands::Status { shop } => commands::status::run(&config, &shop).await,
            Commands::Migrate => commands::migrate::run(&config).await,
        }
    }
    .await;

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
