//! `dropsync migrate` - apply pending database migrations.

use dropsync::connect_and_migrate;

use crate::config::Config;

use super::Result;

pub async fn run(config: &Config) -> Result<()> {
    let url = config.database_url();
    connect_and_migrate(&url).await?;
    println!("database is up to date ({url})");
    Ok(())
}
