//! `dropsync sync` - run a synchronization for one shop.

use std::sync::Arc;

use dropsync::rest::RestPageFetcher;
use dropsync::scheduler::{RequestScheduler, SchedulerConfig};
use dropsync::sync::SyncService;
use dropsync::{OrmRecordStore, OrmStatusStore, SyncEventKind, connect_and_migrate};

use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::shutdown;

use super::{CliError, Result};

pub async fn run(config: &Config, shop: &str, force: bool) -> Result<()> {
    let base = config.remote.base.clone().ok_or_else(|| {
        CliError::Usage(
            "no remote API configured; set [remote] base in the config file \
             or DROPSYNC_REMOTE_BASE"
                .to_string(),
        )
    })?;

    let db = Arc::new(connect_and_migrate(&config.database_url()).await?);

    let fetcher = RestPageFetcher::new(base, config.remote.token.clone())?;
    let scheduler = RequestScheduler::new(SchedulerConfig {
        requests_per_second: config.sync.rate,
        max_in_flight: config.sync.concurrency,
        ..SchedulerConfig::default()
    });

    let service = SyncService::new(
        scheduler,
        Arc::new(fetcher),
        Arc::new(OrmRecordStore::new(Arc::clone(&db))),
        Arc::new(OrmStatusStore::new(db)),
    );

    // Subscribe before starting so no event is missed.
    let mut subscription = service.subscribe(shop).await?;
    shutdown::setup_cancel_handler(service.clone(), shop.to_string());

    let outcome = service.start_sync(shop, force);
    if !outcome.accepted {
        return Err(CliError::Usage(outcome.message));
    }

    let reporter = ProgressReporter::new();
    while let Some(event) = subscription.events.recv().await {
        let terminal = matches!(event.kind, SyncEventKind::Complete | SyncEventKind::Error);
        reporter.handle(&event);
        if terminal {
            break;
        }
    }

    Ok(())
}
