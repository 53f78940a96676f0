use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeliveryJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeliveryJobs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeliveryJobs::Queue).string().not_null())
                    .col(ColumnDef::new(DeliveryJobs::SignalId).string().not_null())
                    .col(
                        ColumnDef::new(DeliveryJobs::SubscriptionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeliveryJobs::WebhookId).string().null())
                    .col(ColumnDef::new(DeliveryJobs::Attempt).integer().not_null())
                    .col(
                        ColumnDef::new(DeliveryJobs::NotBefore)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryJobs::LockedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(DeliveryJobs::LockedBy).string().null())
                    .col(
                        ColumnDef::new(DeliveryJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Claim path: one lane, ready jobs first.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_delivery_jobs_queue_not_before")
                    .table(DeliveryJobs::Table)
                    .col(DeliveryJobs::Queue)
                    .col(DeliveryJobs::NotBefore)
                    .to_owned(),
            )
            .await?;

        // Replaying a job or double-submitting a DLQ retry must not create a
        // second chain for the same attempt.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_delivery_jobs_unique_attempt")
                    .table(DeliveryJobs::Table)
                    .col(DeliveryJobs::SignalId)
                    .col(DeliveryJobs::SubscriptionId)
                    .col(DeliveryJobs::Attempt)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeliveryJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum DeliveryJobs {
    Table,
    Id,
    Queue,
    SignalId,
    SubscriptionId,
    WebhookId,
    Attempt,
    NotBefore,
    LockedAt,
    LockedBy,
    CreatedAt,
}
