pub mod config;
pub mod database;
pub mod delivery;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod stats;
pub mod tunnel;

use axum::middleware::{from_fn, from_fn_with_state};

use crate::state::AppState;

/// Build the full application router: the authenticated `/v1` surface plus
/// the unauthenticated health and tunnel endpoints.
pub fn build_router(state: AppState) -> axum::Router {
    let v1 = routes::v1_routes(state.clone())
        .layer(from_fn(middleware::deadline::request_deadline))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit::rate_limit))
        .layer(from_fn_with_state(state.clone(), middleware::auth::api_key_auth));

    axum::Router::new()
        .merge(routes::public_routes(state))
        .merge(v1)
        .layer(from_fn(middleware::request_id::request_id))
}
