//! Persistent delivery job rows.
//!
//! Jobs live in the same database as signals so fan-out commits atomically
//! with the signal insert. A unique (signal_id, subscription_id, attempt)
//! index makes duplicate enqueues no-ops.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Priority lane name (`delivery-high` or `delivery-normal`).
    pub queue: String,

    pub signal_id: String,

    pub subscription_id: String,

    pub webhook_id: Option<String>,

    /// 1-based attempt number this job will run as.
    pub attempt: i32,

    /// Earliest time a worker may claim this job.
    pub not_before: DateTimeUtc,

    /// Set while a worker holds the job; stale locks are reclaimable after
    /// the visibility timeout.
    pub locked_at: Option<DateTimeUtc>,

    pub locked_by: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
