use common::types::{ApiKeyOwner, ApiKeyStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// SHA-256 hex digest of the raw key. The raw key is never stored.
    pub key_hash: String,

    /// First 12 characters of the raw key, for identification and logging.
    pub key_prefix: String,

    pub owner_type: ApiKeyOwner,

    pub owner_id: String,

    pub name: Option<String>,

    /// Touched lazily on successful validation.
    pub last_used_at: Option<DateTimeUtc>,

    pub expires_at: Option<DateTimeUtc>,

    pub status: ApiKeyStatus,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
