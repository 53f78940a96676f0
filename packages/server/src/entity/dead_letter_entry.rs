use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Terminal failure record for a (signal, subscription) pair that exhausted
/// the retry ladder.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dead_letter_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The final failed delivery.
    pub delivery_id: String,

    pub signal_id: String,

    pub subscription_id: String,

    /// Frozen copy of the payload that was attempted, for replay.
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,

    /// One entry per failed attempt: {attempt, timestamp, code, message}.
    #[sea_orm(column_type = "JsonBinary")]
    pub error_history: Json,

    pub resolved_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
