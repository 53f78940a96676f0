use serde::Serialize;

/// Response of `GET /v1/channels/{id}/stats`. Counts come from the
/// denormalized counters maintained by the stats job.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatsResponse {
    pub signal_count: i32,
    pub subscriber_count: i32,
    /// Fraction of recorded attempts that succeeded; null before the first
    /// delivery.
    pub delivery_success_rate: Option<f64>,
}
