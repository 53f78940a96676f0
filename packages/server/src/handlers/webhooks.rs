use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::instrument;

use crate::entity::{delivery, webhook};
use crate::error::{ApiError, ErrorResponse, RequestError, WithRequestId};
use crate::extractors::auth::ApiKeyAuth;
use crate::middleware::request_id::RequestId;
use crate::models::webhooks::*;
use crate::state::AppState;

/// Delivery history for one webhook endpoint, newest first.
#[utoipa::path(
    get,
    path = "/{id}/deliveries",
    tag = "Webhooks",
    operation_id = "listWebhookDeliveries",
    summary = "List delivery records",
    params(("id" = String, Path, description = "Webhook id"), ListDeliveriesQuery),
    responses(
        (status = 200, description = "Page of deliveries", body = ListDeliveriesResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 403, description = "Webhook belongs to another subscriber", body = ErrorResponse),
        (status = 404, description = "Unknown webhook", body = ErrorResponse),
    ),
    security(("api_key" = [])),
)]
#[instrument(skip(state, auth, query), fields(webhook_id = %webhook_id))]
pub async fn list_deliveries(
    auth: ApiKeyAuth,
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(webhook_id): Path<String>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<Json<ListDeliveriesResponse>, RequestError> {
    let subscriber_id = auth.require_subscriber().rid(&request_id)?;

    let endpoint = webhook::Entity::find_by_id(&webhook_id)
        .one(&state.db)
        .await
        .rid(&request_id)?
        .ok_or_else(|| {
            ApiError::NotFound("webhook not found".into()).with_request_id(&request_id)
        })?;

    if endpoint.subscriber_id != subscriber_id {
        return Err(ApiError::Forbidden("not webhook owner".into()).with_request_id(&request_id));
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 100);

    let mut select = delivery::Entity::find()
        .filter(delivery::Column::WebhookId.eq(&endpoint.id))
        .order_by_desc(delivery::Column::CreatedAt)
        .order_by_desc(delivery::Column::Id)
        .limit(limit);

    if let Some(cursor) = &query.cursor {
        let anchor = delivery::Entity::find_by_id(cursor)
            .one(&state.db)
            .await
            .rid(&request_id)?
            .ok_or_else(|| {
                ApiError::InvalidRequest("unknown cursor".into()).with_request_id(&request_id)
            })?;
        // Compound cursor: retries can land several rows on one timestamp,
        // so rows sharing the anchor timestamp tiebreak on id.
        select = select.filter(
            Condition::any()
                .add(delivery::Column::CreatedAt.lt(anchor.created_at))
                .add(
                    Condition::all()
                        .add(delivery::Column::CreatedAt.eq(anchor.created_at))
                        .add(delivery::Column::Id.lt(anchor.id)),
                ),
        );
    }

    let deliveries = select.all(&state.db).await.rid(&request_id)?;

    let next_cursor = if deliveries.len() as u64 == limit {
        deliveries.last().map(|d| d.id.clone())
    } else {
        None
    };

    Ok(Json(ListDeliveriesResponse {
        items: deliveries.into_iter().map(Into::into).collect(),
        next_cursor,
    }))
}
