//! The page-walk state machine for one sync run.
//!
//! One invocation of [`run_sync`] owns a shop's run from start to a
//! terminal outcome. Pages are fetched and persisted strictly in sequence
//! because each page's cursor comes from the previous response; the
//! durable checkpoint (cursor + counter) is written before the next fetch
//! so a crash loses at most the in-flight page.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use crate::entity::sync_phase::SyncPhase;
use crate::remote::{PageRequest, RemoteError};
use crate::store::StatusPatch;

use super::service::ServiceInner;
use super::types::{RunEnd, SyncError, SyncEvent};

/// Message persisted and published when a run is cancelled.
pub(crate) const CANCELLED_MESSAGE: &str = "sync cancelled before completion; progress preserved";

/// How a run walks the remote collection, decided once at start.
///
/// Exactly one mode applies per run; nothing later in the run re-infers
/// the mode from whichever status fields happen to be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resumption {
    /// Forced: walk the full collection from the beginning, discarding
    /// any prior cursor and counter.
    FreshFull,
    /// Continue an interrupted run from its persisted cursor.
    ResumeCursor(String),
    /// New run with no interruption outstanding: fetch only records newer
    /// than the latest one already stored.
    Incremental { newer_than: Option<i64> },
}

impl Resumption {
    fn label(&self) -> &'static str {
        match self {
            Resumption::FreshFull => "full",
            Resumption::ResumeCursor(_) => "cursor",
            Resumption::Incremental { .. } => "incremental",
        }
    }
}

/// Pick the resumption mode for a start request.
pub(crate) async fn decide_resumption(
    inner: &ServiceInner,
    shop: &str,
    force: bool,
    resume_cursor: Option<String>,
) -> Result<Resumption, SyncError> {
    if force {
        return Ok(Resumption::FreshFull);
    }
    if let Some(cursor) = resume_cursor {
        return Ok(Resumption::ResumeCursor(cursor));
    }
    let newer_than = inner.records.latest_record_identifier(shop).await?;
    Ok(Resumption::Incremental { newer_than })
}

/// Execute one sync run to a terminal outcome.
///
/// Persists the `syncing` entry transition and every per-page checkpoint,
/// publishes `started` and per-page `progress` events, and persists the
/// completion or cancellation transition. The terminal event itself is
/// published by the caller after the run registry has been released, so a
/// listener reacting to it can immediately start a new run.
pub(crate) async fn run_sync(
    inner: &ServiceInner,
    shop: &str,
    force: bool,
    cancel: &AtomicBool,
) -> Result<RunEnd, SyncError> {
    let prior = inner.status.get_status(shop).await?;
    let resumption = decide_resumption(inner, shop, force, prior.resume_cursor.clone()).await?;

    // Only a forced fresh run resets the counter; cursor resumes and
    // incremental runs continue from the persisted count.
    let mut synced = match resumption {
        Resumption::FreshFull => 0,
        _ => prior.synced_count,
    };

    inner
        .status
        .update_status(
            shop,
            StatusPatch {
                phase: Some(SyncPhase::Syncing),
                synced_count: Some(synced),
                error_message: Some(None),
                resume_cursor: match resumption {
                    Resumption::FreshFull => Some(None),
                    _ => None,
                },
                ..StatusPatch::default()
            },
        )
        .await?;

    tracing::info!(shop, force, mode = resumption.label(), synced, "sync run started");
    inner.hub.publish(shop, &SyncEvent::started(shop, synced));

    let (mut cursor, newer_than) = match resumption {
        Resumption::FreshFull => (None, None),
        Resumption::ResumeCursor(cursor) => (Some(cursor), None),
        Resumption::Incremental { newer_than } => (None, newer_than),
    };
    let mut pages = 0u32;

    loop {
        // Cancellation checkpoint: observed before each fetch, never
        // mid-operation. The cursor is left in place for a later resume.
        if cancel.load(Ordering::Acquire) {
            inner
                .status
                .update_status(
                    shop,
                    StatusPatch {
                        phase: Some(SyncPhase::Idle),
                        error_message: Some(Some(CANCELLED_MESSAGE.to_string())),
                        ..StatusPatch::default()
                    },
                )
                .await?;
            tracing::info!(shop, synced, pages, "sync run cancelled");
            return Ok(RunEnd::Cancelled {
                synced,
                message: CANCELLED_MESSAGE.to_string(),
            });
        }

        let request = PageRequest {
            cursor: cursor.clone(),
            newer_than: if cursor.is_none() { newer_than } else { None },
        };

        let page = inner
            .scheduler
            .submit(|| inner.fetcher.fetch_page(shop, request.clone()))
            .await?;

        inner.records.upsert_records(shop, &page.records).await?;
        synced += page.records.len() as i64;
        pages += 1;

        if page.has_more {
            let Some(next) = page.next_cursor else {
                return Err(SyncError::Remote(RemoteError::permanent(
                    "remote reported more pages without a continuation cursor",
                )));
            };

            // Checkpoint before the next fetch: a crash from here on
            // resumes at the page we have not processed yet.
            inner
                .status
                .update_status(
                    shop,
                    StatusPatch {
                        synced_count: Some(synced),
                        resume_cursor: Some(Some(next.clone())),
                        ..StatusPatch::default()
                    },
                )
                .await?;
            inner.hub.publish(shop, &SyncEvent::progress(shop, synced));
            tracing::debug!(shop, page = pages, synced, "page persisted");

            cursor = Some(next);
        } else {
            // The record store's count is authoritative: an incremental
            // run only walked the new tail, and resumed runs may have
            // re-delivered overlapping pages.
            let total = inner.records.record_count(shop).await? as i64;
            inner
                .status
                .update_status(
                    shop,
                    StatusPatch {
                        phase: Some(SyncPhase::Completed),
                        synced_count: Some(total),
                        total_count: Some(Some(total)),
                        resume_cursor: Some(None),
                        last_completed_at: Some(Some(Utc::now())),
                        ..StatusPatch::default()
                    },
                )
                .await?;
            inner.hub.publish(shop, &SyncEvent::progress(shop, synced));
            tracing::info!(shop, total, pages, "sync run completed");
            return Ok(RunEnd::Completed { total });
        }
    }
}
