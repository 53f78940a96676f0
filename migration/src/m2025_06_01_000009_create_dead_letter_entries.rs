use sea_orm_migration::prelude::*;

use crate::m2025_06_01_000005_create_subscriptions::Subscriptions;
use crate::m2025_06_01_000006_create_signals::Signals;
use crate::m2025_06_01_000007_create_deliveries::Deliveries;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeadLetterEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeadLetterEntries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeadLetterEntries::DeliveryId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeadLetterEntries::SignalId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeadLetterEntries::SubscriptionId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeadLetterEntries::Payload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeadLetterEntries::ErrorHistory)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeadLetterEntries::ResolvedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DeadLetterEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dlq_delivery_id")
                            .from(DeadLetterEntries::Table, DeadLetterEntries::DeliveryId)
                            .to(Deliveries::Table, Deliveries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dlq_signal_id")
                            .from(DeadLetterEntries::Table, DeadLetterEntries::SignalId)
                            .to(Signals::Table, Signals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dlq_subscription_id")
                            .from(DeadLetterEntries::Table, DeadLetterEntries::SubscriptionId)
                            .to(Subscriptions::Table, Subscriptions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_dlq_created_at")
                    .table(DeadLetterEntries::Table)
                    .col(DeadLetterEntries::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeadLetterEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum DeadLetterEntries {
    Table,
    Id,
    DeliveryId,
    SignalId,
    SubscriptionId,
    Payload,
    ErrorHistory,
    ResolvedAt,
    CreatedAt,
}
