use common::types::{AccountStatus, AccountTier, DeliveryMode};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscribers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    pub email: String,

    /// Secret used to sign webhook payloads for this subscriber.
    pub webhook_secret: String,

    pub tier: AccountTier,

    pub status: AccountStatus,

    /// Preferred transport; the effective mode is resolved per delivery.
    pub delivery_mode: DeliveryMode,

    pub agent_last_connected_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
