use chrono::{DateTime, Utc};
use common::types::ApiKeyOwner;
use serde::{Deserialize, Serialize};

use crate::entity::dead_letter_entry;

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DlqItem {
    pub id: String,
    pub delivery_id: String,
    pub signal_id: String,
    pub subscription_id: String,
    /// One entry per failed attempt: {attempt, timestamp, code, message}.
    pub error_history: serde_json::Value,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<dead_letter_entry::Model> for DlqItem {
    fn from(entry: dead_letter_entry::Model) -> Self {
        Self {
            id: entry.id,
            delivery_id: entry.delivery_id,
            signal_id: entry.signal_id,
            subscription_id: entry.subscription_id,
            error_history: entry.error_history,
            resolved_at: entry.resolved_at,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DlqListResponse {
    pub items: Vec<DlqItem>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DlqRetryResponse {
    #[schema(example = "queued")]
    pub status: &'static str,
}

/// Body of `POST /v1/admin/api-keys`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    pub owner_type: ApiKeyOwner,
    pub owner_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyResponse {
    pub id: String,
    /// The raw key. Returned exactly once; only its hash is stored.
    pub key: String,
    pub key_prefix: String,
}
