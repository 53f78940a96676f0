use axum::extract::{Path, State};
use axum::{Extension, Json};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QuerySelect};
use tracing::instrument;

use crate::entity::{channel, signal};
use crate::error::{ApiError, ErrorResponse, RequestError, WithRequestId};
use crate::extractors::auth::ApiKeyAuth;
use crate::middleware::request_id::RequestId;
use crate::models::channels::ChannelStatsResponse;
use crate::state::AppState;

/// Channel statistics from the denormalized counters.
#[utoipa::path(
    get,
    path = "/{id}/stats",
    tag = "Channels",
    operation_id = "getChannelStats",
    summary = "Channel statistics",
    params(("id" = String, Path, description = "Channel id")),
    responses(
        (status = 200, description = "Channel statistics", body = ChannelStatsResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Channel belongs to another publisher", body = ErrorResponse),
        (status = 404, description = "Unknown channel", body = ErrorResponse),
    ),
    security(("api_key" = [])),
)]
#[instrument(skip(state, auth), fields(channel_id = %channel_id))]
pub async fn channel_stats(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(channel_id): Path<String>,
) -> Result<Json<ChannelStatsResponse>, RequestError> {
    let publisher_id = auth.require_publisher().rid(&request_id)?;

    let channel_row = channel::Entity::find_by_id(&channel_id)
        .one(&state.db)
        .await
        .rid(&request_id)?
        .ok_or_else(|| {
            ApiError::NotFound("channel not found".into()).with_request_id(&request_id)
        })?;

    if channel_row.publisher_id != publisher_id {
        return Err(ApiError::Forbidden("not channel owner".into()).with_request_id(&request_id));
    }

    let sums: Option<(Option<i64>, Option<i64>)> = signal::Entity::find()
        .select_only()
        .column_as(signal::Column::DeliveredCount.sum(), "delivered")
        .column_as(signal::Column::FailedCount.sum(), "failed")
        .filter(signal::Column::ChannelId.eq(&channel_row.id))
        .into_tuple()
        .one(&state.db)
        .await
        .rid(&request_id)?;

    let (delivered, failed) = sums
        .map(|(d, f)| (d.unwrap_or(0), f.unwrap_or(0)))
        .unwrap_or((0, 0));
    let attempts = delivered + failed;
    let delivery_success_rate = if attempts > 0 {
        Some(delivered as f64 / attempts as f64)
    } else {
        None
    };

    Ok(Json(ChannelStatsResponse {
        signal_count: channel_row.signal_count,
        subscriber_count: channel_row.subscriber_count,
        delivery_success_rate,
    }))
}
