use axum::routing::get;
use axum::Router;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::handlers;
use crate::state::AppState;

/// The authenticated `/v1` surface. Auth and rate-limit layers are applied
/// by the caller.
pub fn v1_routes(state: AppState) -> Router {
    let router = OpenApiRouter::new()
        .nest("/v1/channels", channel_routes(&state))
        .nest("/v1/webhooks", webhook_routes())
        .nest("/v1/admin", admin_routes());

    let (router, _api) = router.split_for_parts();
    router.with_state(state)
}

/// Endpoints that skip API-key auth: liveness and the tunnel upgrade,
/// which authenticates in-band.
pub fn public_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/v1/tunnel", get(crate::tunnel::server::tunnel_ws))
        .with_state(state)
}

fn channel_routes(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::signals::push_signal,
            handlers::signals::list_signals,
        ))
        .routes(routes!(handlers::channels::channel_stats))
        .layer(handlers::signals::signal_body_limit(
            state.config.delivery.max_body_bytes,
        ))
}

fn webhook_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::webhooks::list_deliveries))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::admin::list_dlq))
        .routes(routes!(handlers::admin::retry_dlq))
        .routes(routes!(handlers::admin::create_api_key))
}
