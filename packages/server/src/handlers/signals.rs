use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use common::types::{ChannelStatus, SignalStatus, SignalUrgency, SubscriptionStatus};
use queue::{DeliveryJob, JobQueue, Lane};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{info, instrument};

use crate::entity::{channel, signal, subscription};
use crate::error::{ApiError, ErrorResponse, RequestError, WithRequestId};
use crate::extractors::auth::ApiKeyAuth;
use crate::extractors::json::AppJson;
use crate::middleware::request_id::RequestId;
use crate::models::signals::*;
use crate::state::AppState;

/// Find a channel by id or return 404.
async fn find_channel<C: ConnectionTrait>(db: &C, id: &str) -> Result<channel::Model, ApiError> {
    channel::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("channel not found".into()))
}

/// Ensure the channel belongs to this publisher and is active.
fn check_channel_access(channel: &channel::Model, publisher_id: &str) -> Result<(), ApiError> {
    if channel.publisher_id != publisher_id {
        return Err(ApiError::Forbidden("not channel owner".into()));
    }
    if channel.status != ChannelStatus::Active {
        return Err(ApiError::InvalidRequest("channel is not active".into()));
    }
    Ok(())
}

fn validate_push(payload: &PushSignalRequest, max_body_bytes: usize) -> Result<(), ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::InvalidRequest("title must not be empty".into()));
    }
    if payload.body.len() > max_body_bytes {
        return Err(ApiError::InvalidRequest(format!(
            "body exceeds {} bytes",
            max_body_bytes
        )));
    }
    if let Some(metadata) = &payload.metadata {
        if !metadata.is_object() {
            return Err(ApiError::InvalidRequest(
                "metadata must be a JSON object".into(),
            ));
        }
    }
    Ok(())
}

/// Push a signal into a channel.
///
/// Inserts the signal row and fans out one delivery job per active
/// subscription in a single transaction, so either everything is queued or
/// nothing is.
#[utoipa::path(
    post,
    path = "/{id}/signals",
    tag = "Signals",
    operation_id = "pushSignal",
    summary = "Push a signal",
    params(("id" = String, Path, description = "Channel id")),
    request_body = PushSignalRequest,
    responses(
        (status = 200, description = "Signal accepted", body = PushSignalResponse),
        (status = 400, description = "Invalid payload or inactive channel", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Channel belongs to another publisher", body = ErrorResponse),
        (status = 404, description = "Unknown channel", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
    ),
    security(("api_key" = [])),
)]
#[instrument(skip(state, auth, payload), fields(channel_id = %channel_id))]
pub async fn push_signal(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(channel_id): Path<String>,
    AppJson(payload): AppJson<PushSignalRequest>,
) -> Result<Json<PushSignalResponse>, RequestError> {
    let publisher_id = auth.require_publisher().rid(&request_id)?;
    validate_push(&payload, state.config.delivery.max_body_bytes).rid(&request_id)?;

    let channel_row = find_channel(&state.db, &channel_id).await.rid(&request_id)?;
    check_channel_access(&channel_row, publisher_id).rid(&request_id)?;

    let urgency = payload.urgency.unwrap_or(SignalUrgency::Normal);
    let metadata = payload.metadata.unwrap_or_else(|| serde_json::json!({}));
    let lane = Lane::for_urgency(urgency);
    let signal_id = common::ids::generate("sig");
    let now = Utc::now();

    let txn = state.db.begin().await.rid(&request_id)?;

    let signal_row = signal::ActiveModel {
        id: Set(signal_id.clone()),
        channel_id: Set(channel_row.id.clone()),
        title: Set(payload.title.trim().to_string()),
        body: Set(payload.body.clone()),
        urgency: Set(urgency),
        metadata: Set(metadata),
        delivery_count: Set(0),
        delivered_count: Set(0),
        failed_count: Set(0),
        status: Set(SignalStatus::Active),
        created_at: Set(now),
    }
    .insert(&txn)
    .await
    .rid(&request_id)?;

    let subscriptions = subscription::Entity::find()
        .filter(subscription::Column::ChannelId.eq(&channel_row.id))
        .filter(subscription::Column::Status.eq(SubscriptionStatus::Active))
        .all(&txn)
        .await
        .rid(&request_id)?;

    let fanout = subscriptions.len();
    for sub in subscriptions {
        let job = DeliveryJob {
            signal_id: signal_row.id.clone(),
            subscription_id: sub.id,
            webhook_id: sub.webhook_id,
            attempt: 1,
        };
        JobQueue::enqueue(&txn, lane, job, Duration::ZERO)
            .await
            .rid(&request_id)?;
    }

    txn.commit().await.rid(&request_id)?;

    info!(
        signal_id = %signal_row.id,
        channel_id = %channel_row.id,
        urgency = %urgency,
        fanout,
        lane = %lane,
        "signal accepted"
    );

    Ok(Json(PushSignalResponse {
        id: signal_row.id,
        channel_id: signal_row.channel_id,
        status: "active".to_string(),
        created_at: signal_row.created_at,
    }))
}

/// List signals on a channel, newest first, cursor-paginated.
#[utoipa::path(
    get,
    path = "/{id}/signals",
    tag = "Signals",
    operation_id = "listSignals",
    summary = "List signals for a channel",
    params(("id" = String, Path, description = "Channel id"), ListSignalsQuery),
    responses(
        (status = 200, description = "Page of signals", body = ListSignalsResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Channel belongs to another publisher", body = ErrorResponse),
        (status = 404, description = "Unknown channel", body = ErrorResponse),
    ),
    security(("api_key" = [])),
)]
#[instrument(skip(state, auth, query), fields(channel_id = %channel_id))]
pub async fn list_signals(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(channel_id): Path<String>,
    Query(query): Query<ListSignalsQuery>,
) -> Result<Json<ListSignalsResponse>, RequestError> {
    let publisher_id = auth.require_publisher().rid(&request_id)?;

    let channel_row = find_channel(&state.db, &channel_id).await.rid(&request_id)?;
    if channel_row.publisher_id != publisher_id {
        return Err(ApiError::Forbidden("not channel owner".into()).with_request_id(&request_id));
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 100);

    let mut select = signal::Entity::find()
        .filter(signal::Column::ChannelId.eq(&channel_row.id))
        .order_by_desc(signal::Column::CreatedAt)
        .order_by_desc(signal::Column::Id)
        .limit(limit);

    if let Some(cursor) = &query.cursor {
        let anchor = signal::Entity::find_by_id(cursor)
            .one(&state.db)
            .await
            .rid(&request_id)?
            .ok_or_else(|| {
                ApiError::InvalidRequest("unknown cursor".into()).with_request_id(&request_id)
            })?;
        // Compound cursor: created_at alone is not unique under batch
        // pushes, so rows sharing the anchor timestamp tiebreak on id.
        select = select.filter(
            Condition::any()
                .add(signal::Column::CreatedAt.lt(anchor.created_at))
                .add(
                    Condition::all()
                        .add(signal::Column::CreatedAt.eq(anchor.created_at))
                        .add(signal::Column::Id.lt(anchor.id)),
                ),
        );
    }

    let signals = select.all(&state.db).await.rid(&request_id)?;

    let next_cursor = if signals.len() as u64 == limit {
        signals.last().map(|s| s.id.clone())
    } else {
        None
    };

    Ok(Json(ListSignalsResponse {
        items: signals
            .into_iter()
            .map(|s| SignalListItem {
                id: s.id,
                title: s.title,
                urgency: s.urgency,
                delivered_count: s.delivered_count,
                failed_count: s.failed_count,
                created_at: s.created_at,
            })
            .collect(),
        next_cursor,
    }))
}

/// Body limit for signal pushes: payload cap plus envelope slack.
pub fn signal_body_limit(max_body_bytes: usize) -> axum::extract::DefaultBodyLimit {
    axum::extract::DefaultBodyLimit::max(max_body_bytes + 4096)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str, body: &str, metadata: Option<serde_json::Value>) -> PushSignalRequest {
        PushSignalRequest {
            title: title.to_string(),
            body: body.to_string(),
            urgency: None,
            metadata,
        }
    }

    #[test]
    fn test_validate_rejects_empty_title() {
        assert!(validate_push(&request("  ", "b", None), 1024).is_err());
        assert!(validate_push(&request("t", "b", None), 1024).is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_body() {
        let body = "x".repeat(1025);
        assert!(validate_push(&request("t", &body, None), 1024).is_err());
        let body = "x".repeat(1024);
        assert!(validate_push(&request("t", &body, None), 1024).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_object_metadata() {
        assert!(validate_push(
            &request("t", "b", Some(serde_json::json!([1, 2]))),
            1024
        )
        .is_err());
        assert!(validate_push(
            &request("t", "b", Some(serde_json::json!({"k": "v"}))),
            1024
        )
        .is_ok());
    }

    #[test]
    fn test_channel_access_checks() {
        let channel_row = channel::Model {
            id: "ch_1".into(),
            publisher_id: "pub_1".into(),
            slug: "alerts".into(),
            display_name: "Alerts".into(),
            description: None,
            status: ChannelStatus::Active,
            signal_count: 0,
            subscriber_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(check_channel_access(&channel_row, "pub_1").is_ok());
        assert!(check_channel_access(&channel_row, "pub_2").is_err());

        let paused = channel::Model {
            status: ChannelStatus::Paused,
            ..channel_row
        };
        assert!(check_channel_access(&paused, "pub_1").is_err());
    }
}
