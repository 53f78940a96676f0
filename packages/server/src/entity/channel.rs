use common::types::ChannelStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub publisher_id: String,

    /// URL-friendly identifier, unique across all channels.
    #[sea_orm(unique)]
    pub slug: String,

    pub display_name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub status: ChannelStatus,

    /// Denormalized, refreshed by the stats job.
    pub signal_count: i32,

    /// Denormalized, refreshed by the stats job.
    pub subscriber_count: i32,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
