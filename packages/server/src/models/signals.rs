use chrono::{DateTime, Utc};
use common::types::SignalUrgency;
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/channels/{id}/signals`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PushSignalRequest {
    #[schema(example = "Deploy finished")]
    pub title: String,
    #[schema(example = "build 4812 is live")]
    pub body: String,
    /// Defaults to `normal`.
    pub urgency: Option<SignalUrgency>,
    /// Free-form structured data; must be a JSON object when present.
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushSignalResponse {
    #[schema(example = "sig_x7Kp92mQdRwa")]
    pub id: String,
    pub channel_id: String,
    #[schema(example = "active")]
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListSignalsQuery {
    /// Page size, 1-100. Default 50.
    pub limit: Option<u64>,
    /// Signal id to continue after, from a previous `nextCursor`.
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignalListItem {
    pub id: String,
    pub title: String,
    pub urgency: SignalUrgency,
    pub delivered_count: i32,
    pub failed_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListSignalsResponse {
    pub items: Vec<SignalListItem>,
    pub next_cursor: Option<String>,
}
