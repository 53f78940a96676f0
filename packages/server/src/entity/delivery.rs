use common::types::{DeliveryMode, DeliveryStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One delivery attempt of a signal to a subscription.
///
/// Inserted `pending` before the side effect runs; moves to `success` or
/// `failed` exactly once.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub signal_id: String,

    pub subscription_id: String,

    /// Null for tunnel deliveries.
    pub webhook_id: Option<String>,

    pub mode: DeliveryMode,

    /// 1-based attempt number, monotonic per (signal, subscription).
    pub attempt: i32,

    pub status: DeliveryStatus,

    /// HTTP status from the webhook response, webhook mode only.
    pub status_code: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    pub latency_ms: Option<i32>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
