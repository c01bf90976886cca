//! Durable store boundary consumed by the sync engine.
//!
//! The engine depends on two narrow traits: [`RecordStore`] for the
//! synchronized orders and [`SyncStatusStore`] for the per-shop resumable
//! checkpoint. SeaORM-backed implementations live in this module; tests
//! and alternative backends supply their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;

use crate::entity::sync_phase::SyncPhase;
use crate::remote::RemoteOrder;

mod records;
mod status;

pub use records::OrmRecordStore;
pub use status::OrmStatusStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sea-orm.
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable synchronization state for one shop.
///
/// Owned by the status store and mutated only by the sync engine. The
/// resume cursor is non-null only for a run that is in progress or was
/// interrupted; a forced fresh run is the only thing that resets
/// `synced_count` backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Current lifecycle phase.
    pub phase: SyncPhase,
    /// Records processed so far in the current or last run.
    pub synced_count: i64,
    /// Authoritative record count; set only on completion.
    pub total_count: Option<i64>,
    /// Opaque pagination token to resume from, if interrupted.
    pub resume_cursor: Option<String>,
    /// When the last full walk completed.
    pub last_completed_at: Option<DateTime<Utc>>,
    /// Failure or cancellation detail for the last run.
    pub error_message: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            synced_count: 0,
            total_count: None,
            resume_cursor: None,
            last_completed_at: None,
            error_message: None,
        }
    }
}

/// Partial update for a shop's [`SyncStatus`].
///
/// Outer `None` leaves a field unchanged; `Some(inner)` writes it, where a
/// nullable field's inner `None` clears it.
#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
    pub phase: Option<SyncPhase>,
    pub synced_count: Option<i64>,
    pub total_count: Option<Option<i64>>,
    pub resume_cursor: Option<Option<String>>,
    pub last_completed_at: Option<Option<DateTime<Utc>>>,
    pub error_message: Option<Option<String>>,
}

impl StatusPatch {
    /// Apply this patch on top of an existing status.
    pub fn apply_to(&self, status: &mut SyncStatus) {
        if let Some(phase) = self.phase {
            status.phase = phase;
        }
        if let Some(synced_count) = self.synced_count {
            status.synced_count = synced_count;
        }
        if let Some(total_count) = &self.total_count {
            status.total_count = *total_count;
        }
        if let Some(resume_cursor) = &self.resume_cursor {
            status.resume_cursor = resume_cursor.clone();
        }
        if let Some(last_completed_at) = &self.last_completed_at {
            status.last_completed_at = *last_completed_at;
        }
        if let Some(error_message) = &self.error_message {
            status.error_message = error_message.clone();
        }
    }
}

/// Durable, idempotent storage for synchronized order records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upsert a batch of records keyed by `(shop, remote id)`. Re-delivery
    /// of an identifier overwrites the existing row, never duplicates it.
    /// Returns the number of rows written.
    async fn upsert_records(&self, shop: &str, records: &[RemoteOrder]) -> Result<u64>;

    /// The highest remote identifier stored for `shop`, used to anchor
    /// incremental runs. `None` when nothing has been synced yet.
    async fn latest_record_identifier(&self, shop: &str) -> Result<Option<i64>>;

    /// Authoritative count of stored records for `shop`.
    async fn record_count(&self, shop: &str) -> Result<u64>;
}

/// Durable storage for per-shop sync status.
#[async_trait]
pub trait SyncStatusStore: Send + Sync {
    /// Current status for `shop`; a shop that has never synced reports the
    /// default idle status.
    async fn get_status(&self, shop: &str) -> Result<SyncStatus>;

    /// Apply a partial update to `shop`'s status, creating the row if it
    /// does not exist yet.
    async fn update_status(&self, shop: &str, patch: StatusPatch) -> Result<()>;
}
