//! SeaORM-backed sync status store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};

use crate::entity::sync_status::{ActiveModel, Column, Entity as SyncStatusRecord, Model};

use super::{Result, StatusPatch, SyncStatus, SyncStatusStore};

/// Status store backed by the `sync_statuses` table, one row per shop.
///
/// Partial updates are read-modify-write: the engine is the only writer
/// for a shop's row (one active run per shop), so no row locking is
/// needed.
#[derive(Clone)]
pub struct OrmStatusStore {
    db: Arc<DatabaseConnection>,
}

impl OrmStatusStore {
    /// Create a store over an existing connection.
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn load(&self, shop: &str) -> Result<Option<Model>> {
        let row = SyncStatusRecord::find_by_id(shop.to_string())
            .one(self.db.as_ref())
            .await?;
        Ok(row)
    }
}

impl From<Model> for SyncStatus {
    fn from(row: Model) -> Self {
        Self {
            phase: row.phase,
            synced_count: row.synced_count,
            total_count: row.total_count,
            resume_cursor: row.resume_cursor,
            last_completed_at: row.last_completed_at.map(|t| t.with_timezone(&Utc)),
            error_message: row.error_message,
        }
    }
}

#[async_trait]
impl SyncStatusStore for OrmStatusStore {
    async fn get_status(&self, shop: &str) -> Result<SyncStatus> {
        Ok(self
            .load(shop)
            .await?
            .map(SyncStatus::from)
            .unwrap_or_default())
    }

    async fn update_status(&self, shop: &str, patch: StatusPatch) -> Result<()> {
        let mut status = self
            .load(shop)
            .await?
            .map(SyncStatus::from)
            .unwrap_or_default();
        patch.apply_to(&mut status);

        let row = ActiveModel {
            shop_domain: Set(shop.to_string()),
            phase: Set(status.phase),
            synced_count: Set(status.synced_count),
            total_count: Set(status.total_count),
            resume_cursor: Set(status.resume_cursor),
            last_completed_at: Set(status.last_completed_at.map(|t| t.fixed_offset())),
            error_message: Set(status.error_message),
            updated_at: Set(Utc::now().fixed_offset()),
        };

        SyncStatusRecord::insert(row)
            .on_conflict(
                OnConflict::column(Column::ShopDomain)
                    .update_columns([
                        Column::Phase,
                        Column::SyncedCount,
                        Column::TotalCount,
                        Column::ResumeCursor,
                        Column::LastCompletedAt,
                        Column::ErrorMessage,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;

        Ok(())
    }
}
