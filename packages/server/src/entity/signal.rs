use common::types::{SignalStatus, SignalUrgency};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An immutable event produced on one channel. Only the advisory counters
/// ever change after insert; authoritative counts derive from deliveries.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "signals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub channel_id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub body: String,

    pub urgency: SignalUrgency,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,

    /// Denormalized, refreshed by the stats job.
    pub delivery_count: i32,

    pub delivered_count: i32,

    pub failed_count: i32,

    pub status: SignalStatus,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
