//! `dropsync status` - show the sync state for one shop.

use std::sync::Arc;

use console::style;

use dropsync::{
    OrmRecordStore, OrmStatusStore, RecordStore, SyncPhase, SyncStatusStore, connect_and_migrate,
};

use crate::config::Config;

use super::Result;

pub async fn run(config: &Config, shop: &str) -> Result<()> {
    let db = Arc::new(connect_and_migrate(&config.database_url()).await?);
    let statuses = OrmStatusStore::new(Arc::clone(&db));
    let records = OrmRecordStore::new(db);

    let status = statuses.get_status(shop).await?;
    let record_count = records.record_count(shop).await?;
    let sync_required = status.last_completed_at.is_none();

    let phase = match status.phase {
        SyncPhase::Completed => style(status.phase.to_string()).green(),
        SyncPhase::Error => style(status.phase.to_string()).red(),
        SyncPhase::Syncing => style(status.phase.to_string()).cyan(),
        SyncPhase::Idle => style(status.phase.to_string()).dim(),
    };

    println!("shop:           {shop}");
    println!("phase:          {phase}");
    println!("synced count:   {}", status.synced_count);
    println!("cached records: {record_count}");
    match status.total_count {
        Some(total) => println!("total count:    {total}"),
        None => println!("total count:    unknown"),
    }
    match &status.last_completed_at {
        Some(at) => println!("last completed: {}", at.to_rfc3339()),
        None => println!("last completed: never"),
    }
    if status.resume_cursor.is_some() {
        println!("resume point:   saved (next sync continues where it left off)");
    }
    if let Some(message) = &status.error_message {
        println!("last message:   {message}");
    }
    println!("sync required:  {}", if sync_required { "yes" } else { "no" });

    Ok(())
}
