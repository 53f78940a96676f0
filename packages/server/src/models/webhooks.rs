use chrono::{DateTime, Utc};
use common::types::{DeliveryMode, DeliveryStatus};
use serde::{Deserialize, Serialize};

use crate::entity::delivery;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListDeliveriesQuery {
    /// Page size, 1-100. Default 50.
    pub limit: Option<u64>,
    /// Delivery id to continue after, from a previous `nextCursor`.
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryListItem {
    pub id: String,
    pub signal_id: String,
    pub subscription_id: String,
    pub mode: DeliveryMode,
    pub attempt: i32,
    pub status: DeliveryStatus,
    pub status_code: Option<i32>,
    pub error_message: Option<String>,
    pub latency_ms: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<delivery::Model> for DeliveryListItem {
    fn from(d: delivery::Model) -> Self {
        Self {
            id: d.id,
            signal_id: d.signal_id,
            subscription_id: d.subscription_id,
            mode: d.mode,
            attempt: d.attempt,
            status: d.status,
            status_code: d.status_code,
            error_message: d.error_message,
            latency_ms: d.latency_ms,
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListDeliveriesResponse {
    pub items: Vec<DeliveryListItem>,
    pub next_cursor: Option<String>,
}
