use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per tunnel session, for observability and routing audits.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agent_connections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub subscriber_id: String,

    /// Instance that holds the live socket.
    pub server_id: String,

    pub connected_at: DateTimeUtc,

    pub disconnected_at: Option<DateTimeUtc>,

    pub disconnect_reason: Option<String>,

    pub signals_delivered: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
