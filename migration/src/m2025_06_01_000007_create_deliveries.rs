use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

use crate::m2025_06_01_000005_create_subscriptions::Subscriptions;
use crate::m2025_06_01_000006_create_signals::Signals;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deliveries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Deliveries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Deliveries::SignalId).string().not_null())
                    .col(
                        ColumnDef::new(Deliveries::SubscriptionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Deliveries::WebhookId).string().null())
                    .col(ColumnDef::new(Deliveries::Mode).string().not_null())
                    .col(ColumnDef::new(Deliveries::Attempt).integer().not_null())
                    .col(
                        ColumnDef::new(Deliveries::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Deliveries::StatusCode).integer().null())
                    .col(ColumnDef::new(Deliveries::ErrorMessage).text().null())
                    .col(ColumnDef::new(Deliveries::LatencyMs).integer().null())
                    .col(
                        ColumnDef::new(Deliveries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Deliveries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_signal_id")
                            .from(Deliveries::Table, Deliveries::SignalId)
                            .to(Signals::Table, Signals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_subscription_id")
                            .from(Deliveries::Table, Deliveries::SubscriptionId)
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
                    .name("idx_deliveries_signal_id")
                    .table(Deliveries::Table)
                    .col(Deliveries::SignalId)
                    .to_owned(),
            )
            .await?;

        // Serves the per-webhook delivery history listing.
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_deliveries_webhook_created \
                 ON deliveries (webhook_id, created_at DESC)"
                    .to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deliveries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Deliveries {
    Table,
    Id,
    SignalId,
    SubscriptionId,
    WebhookId,
    Mode,
    Attempt,
    Status,
    StatusCode,
    ErrorMessage,
    LatencyMs,
    CreatedAt,
    UpdatedAt,
}
