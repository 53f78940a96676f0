use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use common::auth::hash_api_key;
use common::types::{AccountTier, ApiKeyOwner, ApiKeyStatus};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::warn;

use crate::entity::{api_key, publisher, subscriber};
use crate::error::{ApiError, RequestError};
use crate::middleware::request_id::RequestId;
use crate::state::AppState;

/// Authenticated caller identity, attached to the request extensions by
/// [`api_key_auth`] and read by handlers through the `ApiKeyAuth` extractor.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub key_id: String,
    pub key_prefix: String,
    pub owner_type: ApiKeyOwner,
    pub owner_id: String,
    pub tier: AccountTier,
}

pub async fn api_key_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, RequestError> {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId("req_unknown".to_string()));

    let header_value = req.headers().get(header::AUTHORIZATION).ok_or_else(|| {
        ApiError::Unauthorized("missing authorization header".to_string())
            .with_request_id(&request_id)
    })?;

    let token = parse_bearer(header_value).map_err(|e| e.with_request_id(&request_id))?;
    let hash = hash_api_key(token);

    let record = api_key::Entity::find()
        .filter(api_key::Column::KeyHash.eq(&hash))
        .filter(api_key::Column::Status.eq(ApiKeyStatus::Active))
        .one(&state.db)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(&request_id))?
        .ok_or_else(|| {
            ApiError::Unauthorized("invalid api key".to_string()).with_request_id(&request_id)
        })?;

    if let Some(expires_at) = record.expires_at {
        if expires_at < Utc::now() {
            return Err(
                ApiError::Unauthorized("api key expired".to_string()).with_request_id(&request_id)
            );
        }
    }

    let tier = owner_tier(&state, record.owner_type, &record.owner_id)
        .await
        .map_err(|e| e.with_request_id(&request_id))?;

    touch_last_used(&state, record.id.clone());

    req.extensions_mut().insert(AuthContext {
        key_id: record.id,
        key_prefix: record.key_prefix,
        owner_type: record.owner_type,
        owner_id: record.owner_id,
        tier,
    });

    Ok(next.run(req).await)
}

async fn owner_tier(
    state: &AppState,
    owner_type: ApiKeyOwner,
    owner_id: &str,
) -> Result<AccountTier, ApiError> {
    let tier = match owner_type {
        ApiKeyOwner::Publisher => publisher::Entity::find_by_id(owner_id)
            .one(&state.db)
            .await?
            .map(|p| p.tier),
        ApiKeyOwner::Subscriber => subscriber::Entity::find_by_id(owner_id)
            .one(&state.db)
            .await?
            .map(|s| s.tier),
    };
    tier.ok_or_else(|| ApiError::Unauthorized("api key owner not found".to_string()))
}

/// Best-effort `last_used_at` update, off the request path.
fn touch_last_used(state: &AppState, key_id: String) {
    let db = state.db.clone();
    tokio::spawn(async move {
        let update = api_key::ActiveModel {
            id: Set(key_id.clone()),
            last_used_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        if let Err(e) = api_key::Entity::update(update).exec(&db).await {
            warn!(key_id = %key_id, error = %e, "failed to touch api key last_used_at");
        }
    });
}

fn parse_bearer(value: &HeaderValue) -> Result<&str, ApiError> {
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("invalid authorization header".to_string()))?;
    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() => Ok(token),
        _ => Err(ApiError::Unauthorized(
            "invalid authorization header".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_accepts_valid_header() {
        let value = HeaderValue::from_static("Bearer hld_pub_abc123");
        assert_eq!(parse_bearer(&value).unwrap(), "hld_pub_abc123");
    }

    #[test]
    fn test_parse_bearer_rejects_other_schemes() {
        for raw in ["Basic dXNlcg==", "bearer x", "Bearer", "Bearer "] {
            let value = HeaderValue::from_static(raw);
            assert!(parse_bearer(&value).is_err(), "accepted {raw:?}");
        }
    }
}
