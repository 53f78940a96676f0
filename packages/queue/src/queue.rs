//! Transactional priority queue for delivery jobs.
//!
//! Enqueue runs on any [`ConnectionTrait`] so callers can commit jobs in the
//! same transaction as the rows they belong to. Dequeue claims one row with
//! `FOR UPDATE SKIP LOCKED`, stamping a lock that expires after the
//! visibility timeout so crashed workers release their jobs.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use sea_orm::sea_query::{LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::types::SignalUrgency;

use crate::entity;
use crate::error::QueueError;

/// Priority lane a job is routed to, chosen by signal urgency at fan-out.
/// Retries stay in the lane the first attempt used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    High,
    Normal,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::High => "delivery-high",
            Lane::Normal => "delivery-normal",
        }
    }

    pub fn for_urgency(urgency: SignalUrgency) -> Self {
        if urgency.is_urgent() {
            Lane::High
        } else {
            Lane::Normal
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of a delivery job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub signal_id: String,
    pub subscription_id: String,
    pub webhook_id: Option<String>,
    /// 1-based attempt number.
    pub attempt: i32,
}

/// A job claimed by a worker. Must be completed or released.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: i64,
    pub lane: Lane,
    pub job: DeliveryJob,
}

#[derive(Clone)]
pub struct JobQueue {
    db: DatabaseConnection,
    visibility_timeout: Duration,
}

impl JobQueue {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            // Must exceed the per-job worker budget so live jobs are never
            // reclaimed from under a healthy worker.
            visibility_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Insert a job on the caller's connection, which may be a transaction.
    ///
    /// Returns `false` when an identical (signal, subscription, attempt) job
    /// already exists; the duplicate is absorbed by the unique index.
    pub async fn enqueue<C: ConnectionTrait>(
        conn: &C,
        lane: Lane,
        job: DeliveryJob,
        delay: Duration,
    ) -> Result<bool, QueueError> {
        let now = Utc::now();
        let not_before = now
            + TimeDelta::from_std(delay).unwrap_or_else(|_| TimeDelta::seconds(delay.as_secs() as i64));

        let model = entity::ActiveModel {
            queue: Set(lane.as_str().to_string()),
            signal_id: Set(job.signal_id.clone()),
            subscription_id: Set(job.subscription_id.clone()),
            webhook_id: Set(job.webhook_id.clone()),
            attempt: Set(job.attempt),
            not_before: Set(not_before),
            locked_at: Set(None),
            locked_by: Set(None),
            created_at: Set(now),
            ..Default::default()
        };

        match model.insert(conn).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(
                    signal_id = %job.signal_id,
                    subscription_id = %job.subscription_id,
                    attempt = job.attempt,
                    "duplicate delivery job absorbed"
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Claim the next runnable job on a lane, or `None` when the lane is idle.
    ///
    /// Ready means `not_before` has passed and the row is unlocked or its
    /// lock has gone stale. Only one worker can win a given row.
    pub async fn dequeue(
        &self,
        lane: Lane,
        worker_id: &str,
    ) -> Result<Option<ClaimedJob>, QueueError> {
        let now = Utc::now();
        let stale_before = now
            - TimeDelta::from_std(self.visibility_timeout)
                .unwrap_or_else(|_| TimeDelta::seconds(120));

        let txn = self.db.begin().await?;

        let row = entity::Entity::find()
            .filter(entity::Column::Queue.eq(lane.as_str()))
            .filter(entity::Column::NotBefore.lte(now))
            .filter(
                Condition::any()
                    .add(entity::Column::LockedAt.is_null())
                    .add(entity::Column::LockedAt.lt(stale_before)),
            )
            .order_by_asc(entity::Column::NotBefore)
            .order_by_asc(entity::Column::Id)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await?;

        let Some(row) = row else {
            txn.commit().await?;
            return Ok(None);
        };

        let claimed = ClaimedJob {
            id: row.id,
            lane,
            job: DeliveryJob {
                signal_id: row.signal_id.clone(),
                subscription_id: row.subscription_id.clone(),
                webhook_id: row.webhook_id.clone(),
                attempt: row.attempt,
            },
        };

        let mut active: entity::ActiveModel = row.into();
        active.locked_at = Set(Some(now));
        active.locked_by = Set(Some(worker_id.to_string()));
        active.update(&txn).await?;

        txn.commit().await?;

        Ok(Some(claimed))
    }

    /// Delete a finished job. Called for success, silent drops, and after
    /// the follow-up retry job has been enqueued.
    pub async fn complete(&self, job_id: i64) -> Result<(), QueueError> {
        entity::Entity::delete_by_id(job_id)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Unlock a claimed job without running it, making it immediately
    /// reclaimable. Used when the worker hits an internal error before the
    /// attempt produced an outcome.
    pub async fn release(&self, job_id: i64) -> Result<(), QueueError> {
        entity::Entity::update_many()
            .col_expr(
                entity::Column::LockedAt,
                sea_orm::sea_query::Expr::value(Option::<chrono::DateTime<Utc>>::None),
            )
            .col_expr(
                entity::Column::LockedBy,
                sea_orm::sea_query::Expr::value(Option::<String>::None),
            )
            .filter(entity::Column::Id.eq(job_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_for_urgency() {
        assert_eq!(Lane::for_urgency(SignalUrgency::Low), Lane::Normal);
        assert_eq!(Lane::for_urgency(SignalUrgency::Normal), Lane::Normal);
        assert_eq!(Lane::for_urgency(SignalUrgency::High), Lane::High);
        assert_eq!(Lane::for_urgency(SignalUrgency::Critical), Lane::High);
    }

    #[test]
    fn test_lane_names_match_queue_rows() {
        assert_eq!(Lane::High.as_str(), "delivery-high");
        assert_eq!(Lane::Normal.as_str(), "delivery-normal");
    }

    #[test]
    fn test_delivery_job_serialization() {
        let job = DeliveryJob {
            signal_id: "sig_123".into(),
            subscription_id: "sub_456".into(),
            webhook_id: Some("wh_789".into()),
            attempt: 3,
        };

        let json = serde_json::to_string(&job).unwrap();
        let parsed: DeliveryJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.signal_id, "sig_123");
        assert_eq!(parsed.webhook_id.as_deref(), Some("wh_789"));
        assert_eq!(parsed.attempt, 3);
    }
}
