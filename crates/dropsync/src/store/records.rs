//! SeaORM-backed record store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
    Set,
};
use uuid::Uuid;

use crate::entity::order_record::{ActiveModel, Column, Entity as OrderRecord};
use crate::remote::RemoteOrder;

use super::{RecordStore, Result};

/// Retry attempts for a batch write that hits transient database errors.
pub const UPSERT_RETRY_ATTEMPTS: u32 = 3;

/// Initial backoff in milliseconds between batch write retries; doubles
/// per attempt.
pub const UPSERT_RETRY_BACKOFF_MS: u64 = 100;

/// Record store backed by the `order_records` table.
///
/// Upserts use a single `INSERT ... ON CONFLICT DO UPDATE` keyed by the
/// `(shop_domain, remote_id)` natural key, so re-delivering a page after a
/// resume overwrites rows instead of duplicating them.
#[derive(Clone)]
pub struct OrmRecordStore {
    db: Arc<DatabaseConnection>,
}

impl OrmRecordStore {
    /// Create a store over an existing connection.
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn to_active_model(
        shop: &str,
        order: &RemoteOrder,
        synced_at: chrono::DateTime<chrono::FixedOffset>,
    ) -> ActiveModel {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            shop_domain: Set(shop.to_string()),
            remote_id: Set(order.id),
            created_at: Set(order.created_at.map(|t| t.fixed_offset())),
            payload: Set(order.payload.clone()),
            synced_at: Set(synced_at),
        }
    }

    /// Build the ON CONFLICT clause for the `(shop_domain, remote_id)`
    /// natural key. The internal UUID key of the existing row is kept.
    fn upsert_on_conflict() -> OnConflict {
        OnConflict::columns([Column::ShopDomain, Column::RemoteId])
            .update_columns([Column::CreatedAt, Column::Payload, Column::SyncedAt])
            .to_owned()
    }

    async fn upsert_batch(&self, models: Vec<ActiveModel>) -> std::result::Result<u64, DbErr> {
        OrderRecord::insert_many(models)
            .on_conflict(Self::upsert_on_conflict())
            .exec_without_returning(self.db.as_ref())
            .await
    }
}

#[async_trait]
impl RecordStore for OrmRecordStore {
    async fn upsert_records(&self, shop: &str, records: &[RemoteOrder]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let synced_at = Utc::now().fixed_offset();
        let models: Vec<ActiveModel> = records
            .iter()
            .map(|order| Self::to_active_model(shop, order, synced_at))
            .collect();

        let mut backoff_ms = UPSERT_RETRY_BACKOFF_MS;
        let mut attempt = 0u32;

        loop {
            match self.upsert_batch(models.clone()).await {
                Ok(rows) => return Ok(rows),
                Err(err) if is_retryable_db_error(&err) && attempt < UPSERT_RETRY_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!(
                        shop,
                        attempt,
                        backoff_ms,
                        error = %err,
                        "record upsert failed transiently, retrying"
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn latest_record_identifier(&self, shop: &str) -> Result<Option<i64>> {
        let latest: Option<Option<i64>> = OrderRecord::find()
            .select_only()
            .column_as(Column::RemoteId.max(), "latest")
            .filter(Column::ShopDomain.eq(shop))
            .into_tuple()
            .one(self.db.as_ref())
            .await?;

        Ok(latest.flatten())
    }

    async fn record_count(&self, shop: &str) -> Result<u64> {
        let count = OrderRecord::find()
            .filter(Column::ShopDomain.eq(shop))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }
}

/// Check whether a database error is transient (lock contention, dropped
/// connection) and worth retrying.
fn is_retryable_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let message = err.to_string().to_lowercase();
            message.contains("locked")
                || message.contains("busy")
                || message.contains("timeout")
                || message.contains("connection")
                || message.contains("temporarily unavailable")
        }
        _ => false,
    }
}
