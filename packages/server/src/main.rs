use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use queue::JobQueue;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::rate_limit::RateLimiter;
use server::state::AppState;
use server::tunnel::registry::AgentRegistry;
use server::tunnel::routing::TunnelRouter;
use server::{build_router, database, delivery, stats, tunnel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load config")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("failed to connect to database")?;

    let redis_client =
        redis::Client::open(config.redis.url.clone()).context("failed to open redis client")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.delivery.timeout_secs))
        .pool_max_idle_per_host(4)
        .build()
        .context("failed to build http client")?;

    let state = AppState {
        db: db.clone(),
        queue: JobQueue::new(db.clone()),
        registry: Arc::new(AgentRegistry::new()),
        router: TunnelRouter::new(redis_client.clone(), config.server.id.clone()),
        limiter: RateLimiter::new(redis_client),
        http,
        config: config.clone(),
    };

    delivery::worker::spawn_workers(&state);
    tokio::spawn(tunnel::routing::run_forward_listener(state.clone()));
    tokio::spawn(stats::run_stats_job(db, Duration::from_secs(60)));

    let app = build_router(state);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    info!(
        bind = %config.server.bind,
        server_id = %config.server.id,
        workers = config.worker.concurrency,
        "herald-server starting"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
