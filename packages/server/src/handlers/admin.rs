use std::time::Duration;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use common::auth::generate_api_key;
use common::types::ApiKeyStatus;
use queue::{DeliveryJob, JobQueue, Lane};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use tracing::{info, instrument};

use crate::entity::{api_key, channel, dead_letter_entry, delivery, signal};
use crate::error::{ApiError, ErrorResponse, RequestError, WithRequestId};
use crate::extractors::auth::ApiKeyAuth;
use crate::extractors::json::AppJson;
use crate::middleware::request_id::RequestId;
use crate::models::dlq::*;
use crate::state::AppState;

/// List unresolved dead letter entries, newest first.
#[utoipa::path(
    get,
    path = "/dlq",
    tag = "Admin",
    operation_id = "listDlqEntries",
    summary = "List DLQ entries",
    responses(
        (status = 200, description = "Unresolved entries", body = DlqListResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Publisher access required", body = ErrorResponse),
    ),
    security(("api_key" = [])),
)]
#[instrument(skip(state, auth))]
pub async fn list_dlq(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<DlqListResponse>, RequestError> {
    auth.require_publisher().rid(&request_id)?;

    let entries = dead_letter_entry::Entity::find()
        .filter(dead_letter_entry::Column::ResolvedAt.is_null())
        .order_by_desc(dead_letter_entry::Column::CreatedAt)
        .all(&state.db)
        .await
        .rid(&request_id)?;

    Ok(Json(DlqListResponse {
        items: entries.into_iter().map(Into::into).collect(),
    }))
}

/// Re-enqueue a dead-lettered (signal, subscription) pair.
///
/// Starts a fresh attempt chain at attempt 1 in the signal's original
/// priority lane and marks the entry resolved. Double submissions are
/// absorbed by the job queue's uniqueness guarantee.
#[utoipa::path(
    post,
    path = "/dlq/{id}/retry",
    tag = "Admin",
    operation_id = "retryDlqEntry",
    summary = "Re-enqueue a DLQ entry",
    params(("id" = String, Path, description = "DLQ entry id")),
    responses(
        (status = 200, description = "Re-enqueued", body = DlqRetryResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Publisher access required", body = ErrorResponse),
        (status = 404, description = "Unknown entry", body = ErrorResponse),
    ),
    security(("api_key" = [])),
)]
#[instrument(skip(state, auth), fields(dlq_id = %id))]
pub async fn retry_dlq(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<DlqRetryResponse>, RequestError> {
    let publisher_id = auth.require_publisher().rid(&request_id)?;

    let entry = dead_letter_entry::Entity::find_by_id(&id)
        .one(&state.db)
        .await
        .rid(&request_id)?
        .ok_or_else(|| {
            ApiError::NotFound("dlq entry not found".into()).with_request_id(&request_id)
        })?;

    let signal_row = signal::Entity::find_by_id(&entry.signal_id)
        .one(&state.db)
        .await
        .rid(&request_id)?
        .ok_or_else(|| {
            ApiError::NotFound("signal no longer exists".into()).with_request_id(&request_id)
        })?;

    let channel_row = channel::Entity::find_by_id(&signal_row.channel_id)
        .one(&state.db)
        .await
        .rid(&request_id)?
        .ok_or_else(|| {
            ApiError::NotFound("channel no longer exists".into()).with_request_id(&request_id)
        })?;

    if channel_row.publisher_id != publisher_id {
        return Err(ApiError::Forbidden("not channel owner".into()).with_request_id(&request_id));
    }

    let final_delivery = delivery::Entity::find_by_id(&entry.delivery_id)
        .one(&state.db)
        .await
        .rid(&request_id)?;

    let job = DeliveryJob {
        signal_id: entry.signal_id.clone(),
        subscription_id: entry.subscription_id.clone(),
        webhook_id: final_delivery.and_then(|d| d.webhook_id),
        attempt: 1,
    };

    JobQueue::enqueue(
        &state.db,
        Lane::for_urgency(signal_row.urgency),
        job,
        Duration::ZERO,
    )
    .await
    .rid(&request_id)?;

    if entry.resolved_at.is_none() {
        let mut active: dead_letter_entry::ActiveModel = entry.into();
        active.resolved_at = Set(Some(Utc::now()));
        active.update(&state.db).await.rid(&request_id)?;
    }

    info!(dlq_id = %id, "dlq entry re-enqueued");

    Ok(Json(DlqRetryResponse { status: "queued" }))
}

/// Issue an API key for a publisher or subscriber.
///
/// The raw key appears in this response and nowhere else.
#[utoipa::path(
    post,
    path = "/api-keys",
    tag = "Admin",
    operation_id = "createApiKey",
    summary = "Issue an API key",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 200, description = "Key issued", body = CreateApiKeyResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Publisher access required", body = ErrorResponse),
    ),
    security(("api_key" = [])),
)]
#[instrument(skip(state, auth, payload))]
pub async fn create_api_key(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    AppJson(payload): AppJson<CreateApiKeyRequest>,
) -> Result<Json<CreateApiKeyResponse>, RequestError> {
    auth.require_publisher().rid(&request_id)?;

    // Hash collisions across active keys are absorbed by regenerating; in
    // practice the first insert wins.
    for _ in 0..3 {
        let issued = generate_api_key(payload.owner_type);
        let key_id = common::ids::generate("key");

        let insert = api_key::ActiveModel {
            id: Set(key_id.clone()),
            key_hash: Set(issued.key_hash.clone()),
            key_prefix: Set(issued.key_prefix.clone()),
            owner_type: Set(payload.owner_type),
            owner_id: Set(payload.owner_id.clone()),
            name: Set(payload.name.clone()),
            last_used_at: Set(None),
            expires_at: Set(None),
            status: Set(ApiKeyStatus::Active),
            created_at: Set(Utc::now()),
        }
        .insert(&state.db)
        .await;

        match insert {
            Ok(_) => {
                info!(key_id = %key_id, key_prefix = %issued.key_prefix, "api key issued");
                return Ok(Json(CreateApiKeyResponse {
                    id: key_id,
                    key: issued.raw,
                    key_prefix: issued.key_prefix,
                }));
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                continue;
            }
            Err(e) => return Err(ApiError::from(e).with_request_id(&request_id)),
        }
    }

    Err(ApiError::Internal("could not issue a unique api key".into())
        .with_request_id(&request_id))
}
