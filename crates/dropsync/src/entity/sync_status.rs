//! SyncStatus entity - durable per-shop synchronization state.
//!
//! One row per shop, keyed by domain. Mutated only by the sync engine; read
//! by anything that wants to display progress or decide whether a sync is
//! needed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::sync_phase::SyncPhase;

/// SyncStatus model - the resumable checkpoint for one shop's stream.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_statuses")]
pub struct Model {
    /// Shop domain, one status row per shop.
    #[sea_orm(primary_key, auto_increment = false)]
    pub shop_domain: String,

    /// Current lifecycle phase.
    pub phase: SyncPhase,
    /// Records processed so far in the current (or last) run.
    pub synced_count: i64,
    /// Authoritative record count, set on completion only.
    pub total_count: Option<i64>,
    /// Opaque remote pagination token persisted after each processed page.
    /// Non-null only for an in-progress or interrupted run.
    #[sea_orm(column_type = "Text", nullable)]
    pub resume_cursor: Option<String>,
    /// When the last run completed the full walk.
    pub last_completed_at: Option<DateTimeWithTimeZone>,
    /// Failure or cancellation detail for the last run.
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    /// When this row was last written.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
