use std::sync::Arc;

use queue::JobQueue;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::rate_limit::RateLimiter;
use crate::tunnel::registry::AgentRegistry;
use crate::tunnel::routing::TunnelRouter;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub queue: JobQueue,
    pub registry: Arc<AgentRegistry>,
    pub router: TunnelRouter,
    pub limiter: RateLimiter,
    pub http: reqwest::Client,
    pub config: AppConfig,
}
