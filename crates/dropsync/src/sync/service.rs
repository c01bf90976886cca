//! The sync service: run registry and caller surface.
//!
//! One [`SyncService`] exists per process, created at startup and handed
//! explicitly to whatever exposes it (HTTP layer, CLI). It owns the only
//! mutable registry in the system: the map of shops with an active run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::remote::PageFetcher;
use crate::scheduler::RequestScheduler;
use crate::store::{RecordStore, StatusPatch, StoreError, SyncStatusStore};

use super::hub::{ListenerId, ProgressHub};
use super::runner;
use super::types::{FullSyncStatus, RunEnd, StartOutcome, SyncEvent};
use crate::entity::sync_phase::SyncPhase;

pub(crate) struct ServiceInner {
    pub(crate) scheduler: RequestScheduler,
    pub(crate) fetcher: Arc<dyn PageFetcher>,
    pub(crate) records: Arc<dyn RecordStore>,
    pub(crate) status: Arc<dyn SyncStatusStore>,
    pub(crate) hub: ProgressHub,
    runs: Mutex<HashMap<String, ActiveRun>>,
}

struct ActiveRun {
    cancel: Arc<AtomicBool>,
}

/// A live-updates subscription for one shop.
///
/// Carries the immediate status snapshot taken at subscription time; the
/// receiver then streams events as the engine publishes them. Works the
/// same whether or not a run is active.
pub struct Subscription {
    /// Handle for [`SyncService::unsubscribe`].
    pub id: ListenerId,
    /// Status snapshot taken when the subscription was opened.
    pub snapshot: FullSyncStatus,
    /// Live event stream.
    pub events: mpsc::UnboundedReceiver<SyncEvent>,
}

/// Orchestrates sync runs for any number of shops.
///
/// At most one run is active per shop; all runs share one scheduler and
/// therefore one remote rate budget. Cloning shares the same registry.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<ServiceInner>,
}

impl SyncService {
    /// Create the process-wide service.
    pub fn new(
        scheduler: RequestScheduler,
        fetcher: Arc<dyn PageFetcher>,
        records: Arc<dyn RecordStore>,
        status: Arc<dyn SyncStatusStore>,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                scheduler,
                fetcher,
                records,
                status,
                hub: ProgressHub::new(),
                runs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Request a sync run for `shop`.
    ///
    /// Returns immediately: an accepted run executes on a background task
    /// whose completion handler routes the terminal outcome into the
    /// durable status and the event hub, so failures are never silently
    /// dropped. A request for a shop that is already syncing is rejected
    /// synchronously, never queued.
    pub fn start_sync(&self, shop: &str, force: bool) -> StartOutcome {
        let cancel = {
            let mut runs = self.inner.runs.lock().unwrap_or_else(|e| e.into_inner());
            if runs.contains_key(shop) {
                return StartOutcome {
                    accepted: false,
                    message: "sync already in progress".to_string(),
                };
            }
            let cancel = Arc::new(AtomicBool::new(false));
            runs.insert(
                shop.to_string(),
                ActiveRun {
                    cancel: Arc::clone(&cancel),
                },
            );
            cancel
        };

        let inner = Arc::clone(&self.inner);
        let shop = shop.to_string();
        tokio::spawn(async move {
            let end = runner::run_sync(&inner, &shop, force, &cancel).await;

            // Release the registry before the terminal event so a listener
            // reacting to it can start the next run without being rejected.
            {
                let mut runs = inner.runs.lock().unwrap_or_else(|e| e.into_inner());
                runs.remove(&shop);
            }

            match end {
                Ok(RunEnd::Completed { total }) => {
                    inner.hub.publish(&shop, &SyncEvent::complete(&shop, total));
                }
                Ok(RunEnd::Cancelled { synced, message }) => {
                    inner
                        .hub
                        .publish(&shop, &SyncEvent::error(&shop, synced, message));
                }
                Err(err) => {
                    let message = err.to_string();
                    tracing::warn!(shop = %shop, error = %message, "sync run failed");

                    if let Err(status_err) = inner
                        .status
                        .update_status(
                            &shop,
                            StatusPatch {
                                phase: Some(SyncPhase::Error),
                                error_message: Some(Some(message.clone())),
                                ..StatusPatch::default()
                            },
                        )
                        .await
                    {
                        tracing::error!(
                            shop = %shop,
                            error = %status_err,
                            "failed to persist error phase after sync failure"
                        );
                    }

                    let synced = match inner.status.get_status(&shop).await {
                        Ok(status) => status.synced_count,
                        Err(_) => 0,
                    };
                    inner
                        .hub
                        .publish(&shop, &SyncEvent::error(&shop, synced, message));
                }
            }
        });

        StartOutcome {
            accepted: true,
            message: if force {
                "forced sync started".to_string()
            } else {
                "sync started".to_string()
            },
        }
    }

    /// Request cancellation of `shop`'s active run.
    ///
    /// Cooperative: the run observes the signal at its next checkpoint,
    /// finishing any in-flight page first. Returns whether a run was
    /// actually signalled.
    pub fn cancel_sync(&self, shop: &str) -> bool {
        let runs = self.inner.runs.lock().unwrap_or_else(|e| e.into_inner());
        match runs.get(shop) {
            Some(run) => {
                run.cancel.store(true, Ordering::Release);
                tracing::info!(shop, "cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Whether a run is currently active for `shop`.
    pub fn is_syncing(&self, shop: &str) -> bool {
        let runs = self.inner.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.contains_key(shop)
    }

    /// Durable status plus derived fields for callers.
    pub async fn get_full_status(&self, shop: &str) -> Result<FullSyncStatus, StoreError> {
        let status = self.inner.status.get_status(shop).await?;
        let cached_record_count = self.inner.records.record_count(shop).await?;
        let sync_required = status.last_completed_at.is_none();

        Ok(FullSyncStatus {
            status,
            cached_record_count,
            sync_required,
        })
    }

    /// Open a live-updates subscription for `shop`.
    ///
    /// The returned [`Subscription`] carries one immediate status snapshot;
    /// no events follow until a run publishes some.
    pub async fn subscribe(&self, shop: &str) -> Result<Subscription, StoreError> {
        let snapshot = self.get_full_status(shop).await?;
        let (id, events) = self.inner.hub.subscribe(shop);

        Ok(Subscription {
            id,
            snapshot,
            events,
        })
    }

    /// Close a subscription opened with [`SyncService::subscribe`].
    pub fn unsubscribe(&self, shop: &str, id: ListenerId) -> bool {
        self.inner.hub.unsubscribe(shop, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::remote::{OrderPage, PageRequest, RemoteError, RemoteOrder};
    use crate::scheduler::SchedulerConfig;
    use crate::store::SyncStatus;
    use crate::sync::types::SyncEventKind;

    /// In-memory record store for service-level tests.
    #[derive(Default)]
    struct MemoryRecordStore {
        records: Mutex<HashMap<String, HashMap<i64, RemoteOrder>>>,
    }

    #[async_trait]
    impl RecordStore for MemoryRecordStore {
        async fn upsert_records(
            &self,
            shop: &str,
            records: &[RemoteOrder],
        ) -> Result<u64, StoreError> {
            let mut all = self.records.lock().unwrap_or_else(|e| e.into_inner());
            let shop_records = all.entry(shop.to_string()).or_default();
            for record in records {
                shop_records.insert(record.id, record.clone());
            }
            Ok(records.len() as u64)
        }

        async fn latest_record_identifier(&self, shop: &str) -> Result<Option<i64>, StoreError> {
            let all = self.records.lock().unwrap_or_else(|e| e.into_inner());
            Ok(all
                .get(shop)
                .and_then(|records| records.keys().max().copied()))
        }

        async fn record_count(&self, shop: &str) -> Result<u64, StoreError> {
            let all = self.records.lock().unwrap_or_else(|e| e.into_inner());
            Ok(all.get(shop).map_or(0, HashMap::len) as u64)
        }
    }

    /// In-memory status store for service-level tests.
    #[derive(Default)]
    struct MemoryStatusStore {
        statuses: Mutex<HashMap<String, SyncStatus>>,
    }

    #[async_trait]
    impl SyncStatusStore for MemoryStatusStore {
        async fn get_status(&self, shop: &str) -> Result<SyncStatus, StoreError> {
            let statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
            Ok(statuses.get(shop).cloned().unwrap_or_default())
        }

        async fn update_status(&self, shop: &str, patch: StatusPatch) -> Result<(), StoreError> {
            let mut statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
            let status = statuses.entry(shop.to_string()).or_default();
            patch.apply_to(status);
            Ok(())
        }
    }

    /// Fetcher that serves a fixed sequence of pages, recording requests.
    struct ScriptedFetcher {
        pages: Mutex<Vec<Result<OrderPage, RemoteError>>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<Result<OrderPage, RemoteError>>) -> Self {
            Self {
                pages: Mutex::new(pages),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(
            &self,
            _shop: &str,
            request: PageRequest,
        ) -> Result<OrderPage, RemoteError> {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(request);
            let mut pages = self.pages.lock().unwrap_or_else(|e| e.into_inner());
            if pages.is_empty() {
                return Err(RemoteError::permanent("scripted fetcher ran out of pages"));
            }
            pages.remove(0)
        }
    }

    fn order(id: i64) -> RemoteOrder {
        RemoteOrder {
            id,
            created_at: None,
            payload: serde_json::json!({ "id": id }),
        }
    }

    fn page(ids: &[i64], next_cursor: Option<&str>) -> OrderPage {
        OrderPage {
            records: ids.iter().copied().map(order).collect(),
            next_cursor: next_cursor.map(str::to_string),
            has_more: next_cursor.is_some(),
        }
    }

    fn service(fetcher: Arc<ScriptedFetcher>) -> SyncService {
        let scheduler = RequestScheduler::new(SchedulerConfig {
            requests_per_second: 1_000_000.0,
            max_retries: 0,
            ..SchedulerConfig::default()
        });
        SyncService::new(
            scheduler,
            fetcher,
            Arc::new(MemoryRecordStore::default()),
            Arc::new(MemoryStatusStore::default()),
        )
    }

    /// Drain events until a terminal one arrives, with a timeout guard.
    async fn wait_for_terminal(subscription: &mut Subscription) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = subscription.events.recv().await.expect("event stream open");
                if matches!(event.kind, SyncEventKind::Complete | SyncEventKind::Error) {
                    return event;
                }
            }
        })
        .await
        .expect("run should reach a terminal event")
    }

    #[tokio::test]
    async fn start_runs_to_completion_and_publishes_events() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Ok(page(&[1, 2], Some("c1"))),
            Ok(page(&[3], None)),
        ]));
        let service = service(Arc::clone(&fetcher));

        let mut subscription = service.subscribe("shop.example").await.expect("subscribe");
        assert!(subscription.snapshot.sync_required);

        let outcome = service.start_sync("shop.example", false);
        assert!(outcome.accepted);

        let terminal = wait_for_terminal(&mut subscription).await;
        assert_eq!(terminal.kind, SyncEventKind::Complete);
        assert_eq!(terminal.total_if_known, Some(3));

        let full = service
            .get_full_status("shop.example")
            .await
            .expect("status");
        assert_eq!(full.status.phase, SyncPhase::Completed);
        assert_eq!(full.status.synced_count, 3);
        assert_eq!(full.cached_record_count, 3);
        assert!(full.status.resume_cursor.is_none());
        assert!(!full.sync_required);
    }

    #[tokio::test]
    async fn second_start_for_same_shop_is_rejected() {
        // A fetcher that never responds keeps the first run active.
        struct StallingFetcher;

        #[async_trait]
        impl PageFetcher for StallingFetcher {
            async fn fetch_page(
                &self,
                _shop: &str,
                _request: PageRequest,
            ) -> Result<OrderPage, RemoteError> {
                std::future::pending().await
            }
        }

        let scheduler = RequestScheduler::new(SchedulerConfig {
            requests_per_second: 1_000_000.0,
            ..SchedulerConfig::default()
        });
        let service = SyncService::new(
            scheduler,
            Arc::new(StallingFetcher),
            Arc::new(MemoryRecordStore::default()),
            Arc::new(MemoryStatusStore::default()),
        );

        let first = service.start_sync("shop.example", false);
        let second = service.start_sync("shop.example", false);

        assert!(first.accepted);
        assert!(!second.accepted);
        assert!(second.message.contains("already in progress"));

        // A different shop is unaffected by the busy one.
        assert!(service.start_sync("other-shop.example", false).accepted);
    }

    #[tokio::test]
    async fn failed_run_persists_error_phase_and_event() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Ok(page(&[1, 2], Some("c1"))),
            Err(RemoteError::permanent("403 Forbidden")),
        ]));
        let service = service(Arc::clone(&fetcher));

        let mut subscription = service.subscribe("shop.example").await.expect("subscribe");
        assert!(service.start_sync("shop.example", false).accepted);

        let terminal = wait_for_terminal(&mut subscription).await;
        assert_eq!(terminal.kind, SyncEventKind::Error);
        assert!(terminal.message.as_deref().unwrap().contains("403"));

        let full = service
            .get_full_status("shop.example")
            .await
            .expect("status");
        assert_eq!(full.status.phase, SyncPhase::Error);
        assert!(full.status.error_message.as_deref().unwrap().contains("403"));
        // The cursor persisted after page 1 survives the failure.
        assert_eq!(full.status.resume_cursor.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn cancel_without_active_run_reports_false() {
        let fetcher = Arc::new(ScriptedFetcher::new(Vec::new()));
        let service = service(fetcher);
        assert!(!service.cancel_sync("shop.example"));
    }

    #[tokio::test]
    async fn subscription_with_no_run_sees_snapshot_and_no_events() {
        let fetcher = Arc::new(ScriptedFetcher::new(Vec::new()));
        let service = service(fetcher);

        let mut subscription = service.subscribe("shop.example").await.expect("subscribe");
        assert_eq!(subscription.snapshot.status, SyncStatus::default());
        assert_eq!(subscription.snapshot.cached_record_count, 0);

        // Nothing published yet, so the stream stays silent.
        assert!(subscription.events.try_recv().is_err());

        assert!(service.unsubscribe("shop.example", subscription.id));
    }

    #[tokio::test]
    async fn incremental_start_anchors_at_latest_stored_identifier() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            Ok(page(&[10, 11], None)),
            Ok(page(&[12], None)),
        ]));
        let service = service(Arc::clone(&fetcher));

        let mut subscription = service.subscribe("shop.example").await.expect("subscribe");
        assert!(service.start_sync("shop.example", false).accepted);
        wait_for_terminal(&mut subscription).await;

        assert!(service.start_sync("shop.example", false).accepted);
        wait_for_terminal(&mut subscription).await;

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 2);
        // First run had nothing stored; second anchors past order 11.
        assert_eq!(requests[0].newer_than, None);
        assert_eq!(requests[1].newer_than, Some(11));
        assert!(requests[1].cursor.is_none());
    }
}
