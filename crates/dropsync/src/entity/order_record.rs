//! OrderRecord entity - one synchronized order from a shop's remote API.
//!
//! The remote payload is stored verbatim as JSON; the engine never looks
//! inside it. `(shop_domain, remote_id)` is the natural key used for
//! idempotent upserts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// OrderRecord model - a single order synchronized from the remote API.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_records")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// The shop this order belongs to.
    pub shop_domain: String,
    /// Stable identifier assigned by the remote API.
    pub remote_id: i64,

    /// When the order was created on the remote platform.
    pub created_at: Option<DateTimeWithTimeZone>,
    /// Full remote payload, stored opaquely.
    #[sea_orm(column_type = "Json")]
    pub payload: serde_json::Value,

    /// When this row was last written by a sync run.
    pub synced_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
