use sea_orm_migration::prelude::*;

use crate::m2025_06_01_000002_create_subscribers::Subscribers;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AgentConnections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AgentConnections::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AgentConnections::SubscriberId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgentConnections::ServerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AgentConnections::ConnectedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AgentConnections::DisconnectedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AgentConnections::DisconnectReason)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AgentConnections::SignalsDelivered)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_agent_connections_subscriber_id")
                            .from(AgentConnections::Table, AgentConnections::SubscriberId)
                            .to(Subscribers::Table, Subscribers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_agent_connections_subscriber_id")
                    .table(AgentConnections::Table)
                    .col(AgentConnections::SubscriberId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AgentConnections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AgentConnections {
    Table,
    Id,
    SubscriberId,
    ServerId,
    ConnectedAt,
    DisconnectedAt,
    DisconnectReason,
    SignalsDelivered,
}
