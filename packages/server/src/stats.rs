//! Background refresh of denormalized counters.
//!
//! Signal and channel counters are advisory summaries; recomputing them off
//! the hot path keeps the delivery loop free of per-attempt counter writes.

use std::time::Duration;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use tracing::{debug, error, info};

const SIGNAL_COUNTERS_SQL: &str = r#"
UPDATE signals SET
    delivery_count = agg.total,
    delivered_count = agg.ok,
    failed_count = agg.fail
FROM (
    SELECT signal_id,
           COUNT(*)::int AS total,
           COUNT(*) FILTER (WHERE status = 'success')::int AS ok,
           COUNT(*) FILTER (WHERE status = 'failed')::int AS fail
    FROM deliveries
    GROUP BY signal_id
) AS agg
WHERE signals.id = agg.signal_id
  AND (signals.delivery_count, signals.delivered_count, signals.failed_count)
      IS DISTINCT FROM (agg.total, agg.ok, agg.fail)
"#;

const CHANNEL_COUNTERS_SQL: &str = r#"
UPDATE channels SET
    signal_count = (
        SELECT COUNT(*)::int FROM signals
        WHERE signals.channel_id = channels.id AND signals.status = 'active'
    ),
    subscriber_count = (
        SELECT COUNT(*)::int FROM subscriptions
        WHERE subscriptions.channel_id = channels.id
          AND subscriptions.status = 'active'
    )
"#;

/// Run the stats refresher until process exit.
pub async fn run_stats_job(db: DatabaseConnection, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "starting stats job");

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        if let Err(e) = refresh_counters(&db).await {
            error!(error = %e, "stats refresh failed");
        }
    }
}

async fn refresh_counters(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    let signals = db
        .execute(Statement::from_string(
            DbBackend::Postgres,
            SIGNAL_COUNTERS_SQL.to_string(),
        ))
        .await?;

    let channels = db
        .execute(Statement::from_string(
            DbBackend::Postgres,
            CHANNEL_COUNTERS_SQL.to_string(),
        ))
        .await?;

    debug!(
        signals_updated = signals.rows_affected(),
        channels_updated = channels.rows_affected(),
        "counters refreshed"
    );

    Ok(())
}
