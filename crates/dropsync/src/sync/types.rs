//! Shared sync types.

use serde::Serialize;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::{StoreError, SyncStatus};

/// Kind of a [`SyncEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEventKind {
    /// A run began (fresh, resumed, or incremental).
    Started,
    /// A page was fetched and persisted.
    Progress,
    /// The run walked the whole collection.
    Complete,
    /// The run ended early - failure or cancellation; the durable phase
    /// distinguishes the two.
    Error,
}

/// One live progress update for a shop's sync run.
///
/// Events are immutable, one-shot, and never persisted; they serialize
/// camelCase for the HTTP layer's live-update channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub kind: SyncEventKind,
    pub shop: String,
    pub synced_so_far: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_if_known: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncEvent {
    pub(crate) fn started(shop: &str, synced_so_far: i64) -> Self {
        Self {
            kind: SyncEventKind::Started,
            shop: shop.to_string(),
            synced_so_far,
            total_if_known: None,
            message: None,
        }
    }

    pub(crate) fn progress(shop: &str, synced_so_far: i64) -> Self {
        Self {
            kind: SyncEventKind::Progress,
            shop: shop.to_string(),
            synced_so_far,
            total_if_known: None,
            message: None,
        }
    }

    pub(crate) fn complete(shop: &str, total: i64) -> Self {
        Self {
            kind: SyncEventKind::Complete,
            shop: shop.to_string(),
            synced_so_far: total,
            total_if_known: Some(total),
            message: None,
        }
    }

    pub(crate) fn error(shop: &str, synced_so_far: i64, message: impl Into<String>) -> Self {
        Self {
            kind: SyncEventKind::Error,
            shop: shop.to_string(),
            synced_so_far,
            total_if_known: None,
            message: Some(message.into()),
        }
    }
}

/// Synchronous answer to a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    /// Whether a run was actually started.
    pub accepted: bool,
    /// Human-readable explanation ("sync started", "already in progress").
    pub message: String,
}

/// A shop's durable status plus fields derived for callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSyncStatus {
    /// The durable status record.
    pub status: SyncStatus,
    /// Authoritative count of records currently stored for the shop.
    pub cached_record_count: u64,
    /// Whether no run has ever completed for this shop.
    pub sync_required: bool,
}

/// Failures that end a sync run.
///
/// Transient remote failures never reach this type - the scheduler absorbs
/// them. Cancellation is a [`RunEnd`] outcome, not an error.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The scheduler exhausted its retry budget or hit a permanent remote
    /// failure.
    #[error("remote API failure: {0}")]
    Remote(#[from] RemoteError),

    /// A durable store write or read failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// How a run ended when it did not fail.
#[derive(Debug)]
pub(crate) enum RunEnd {
    /// The remote collection reported no further pages.
    Completed { total: i64 },
    /// A cancellation request was observed at a checkpoint.
    Cancelled { synced: i64, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_camel_case() {
        let event = SyncEvent::complete("shop.example", 5);
        let json = serde_json::to_value(&event).expect("serialize");

        assert_eq!(json["kind"], "complete");
        assert_eq!(json["shop"], "shop.example");
        assert_eq!(json["syncedSoFar"], 5);
        assert_eq!(json["totalIfKnown"], 5);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn error_event_carries_message() {
        let event = SyncEvent::error("shop.example", 2, "sync cancelled");
        assert_eq!(event.kind, SyncEventKind::Error);
        assert_eq!(event.synced_so_far, 2);
        assert_eq!(event.message.as_deref(), Some("sync cancelled"));
        assert!(event.total_if_known.is_none());
    }

    #[test]
    fn sync_error_wraps_sources() {
        let err = SyncError::from(RemoteError::permanent("410 Gone"));
        assert!(err.to_string().contains("410 Gone"));
        assert!(err.to_string().contains("remote API failure"));
    }
}
