//! Webhook transport: signed HTTPS POST to a subscriber endpoint.

use std::time::Duration;

use chrono::Utc;
use common::auth::sign_payload;

use crate::entity::webhook;
use crate::state::AppState;

/// Result of one webhook POST.
#[derive(Debug)]
pub struct WebhookResult {
    pub success: bool,
    pub status_code: Option<i32>,
    pub error: Option<String>,
}

/// POST the signed envelope to the webhook. Success iff the endpoint
/// answers 2xx within the configured deadline.
pub async fn deliver(
    state: &AppState,
    endpoint: &webhook::Model,
    delivery_id: &str,
    signing_secret: &str,
    payload: &serde_json::Value,
) -> WebhookResult {
    let body = match serde_json::to_string(payload) {
        Ok(body) => body,
        Err(e) => {
            return WebhookResult {
                success: false,
                status_code: None,
                error: Some(format!("payload serialization failed: {}", e)),
            }
        }
    };

    let timestamp = Utc::now().timestamp();
    let signature = sign_payload(signing_secret, timestamp, &body);

    let mut request = state
        .http
        .post(&endpoint.url)
        .timeout(Duration::from_secs(state.config.delivery.timeout_secs))
        .header("Content-Type", "application/json")
        .header("X-Herald-Signature", signature)
        .header("X-Herald-Timestamp", timestamp.to_string())
        .header("X-Herald-Delivery-Id", delivery_id);

    if let Some(token) = endpoint.token.as_deref() {
        request = request.header("Authorization", format!("Bearer {}", token));
    }

    match request.body(body).send().await {
        Ok(response) => {
            let status_code = response.status().as_u16() as i32;
            if response.status().is_success() {
                WebhookResult {
                    success: true,
                    status_code: Some(status_code),
                    error: None,
                }
            } else {
                WebhookResult {
                    success: false,
                    status_code: Some(status_code),
                    error: Some(format!("HTTP {}", status_code)),
                }
            }
        }
        Err(e) => WebhookResult {
            success: false,
            status_code: None,
            error: Some(e.to_string()),
        },
    }
}

/// Record a successful POST on the endpoint row: consecutive-failure count
/// resets and the success timestamp advances.
pub async fn mark_success(state: &AppState, webhook_id: &str) {
    use sea_orm::sea_query::Expr;
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

    let now = Utc::now();
    let result = webhook::Entity::update_many()
        .col_expr(webhook::Column::FailureCount, Expr::value(0))
        .col_expr(webhook::Column::LastSuccessAt, Expr::value(Some(now)))
        .col_expr(webhook::Column::UpdatedAt, Expr::value(now))
        .filter(webhook::Column::Id.eq(webhook_id))
        .exec(&state.db)
        .await;

    if let Err(e) = result {
        tracing::warn!(webhook_id = %webhook_id, error = %e, "failed to record webhook success");
    }
}

/// Record a failed POST on the endpoint row.
pub async fn mark_failure(state: &AppState, webhook_id: &str) {
    use sea_orm::sea_query::Expr;
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

    let now = Utc::now();
    let result = webhook::Entity::update_many()
        .col_expr(
            webhook::Column::FailureCount,
            Expr::col(webhook::Column::FailureCount).add(1),
        )
        .col_expr(webhook::Column::LastFailureAt, Expr::value(Some(now)))
        .col_expr(webhook::Column::UpdatedAt, Expr::value(now))
        .filter(webhook::Column::Id.eq(webhook_id))
        .exec(&state.db)
        .await;

    if let Err(e) = result {
        tracing::warn!(webhook_id = %webhook_id, error = %e, "failed to record webhook failure");
    }
}
