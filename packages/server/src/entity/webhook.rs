use common::types::WebhookStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webhooks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub subscriber_id: String,

    pub url: String,

    pub name: String,

    /// Optional bearer token sent verbatim on outbound requests.
    pub token: Option<String>,

    pub status: WebhookStatus,

    /// Consecutive failures; reset on success. Maintained by the worker.
    pub failure_count: i32,

    pub last_success_at: Option<DateTimeUtc>,

    pub last_failure_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
