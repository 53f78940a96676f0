use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::middleware::auth::AuthContext;
use crate::middleware::request_id::RequestId;
use crate::rate_limit::{tier_capacity, RateDecision};
use crate::state::AppState;

/// Enforces the per-key token bucket and stamps `X-RateLimit-*` headers on
/// every response that passed authentication.
pub async fn rate_limit(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId("req_unknown".to_string()));

    let Some(auth) = req.extensions().get::<AuthContext>().cloned() else {
        return ApiError::Unauthorized("missing auth context".to_string())
            .with_request_id(&request_id)
            .into_response();
    };

    let capacity = tier_capacity(&state.config.rate_limit, auth.tier);

    let decision = match state.limiter.check(&auth.key_id, capacity).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(error = %e, key_prefix = %auth.key_prefix, "rate limiter unavailable");
            return ApiError::Internal(e.to_string())
                .with_request_id(&request_id)
                .into_response();
        }
    };

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        ApiError::RateLimited
            .with_request_id(&request_id)
            .into_response()
    };

    apply_headers(&mut response, &decision);
    response
}

fn apply_headers(response: &mut Response, decision: &RateDecision) {
    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from(decision.remaining),
    );
    if let Ok(reset) = HeaderValue::from_str(&decision.reset.to_string()) {
        headers.insert("X-RateLimit-Reset", reset);
    }
}
