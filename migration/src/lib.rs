//! Database migrations for the Herald relay.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000001_create_publishers;
mod m2025_06_01_000002_create_subscribers;
mod m2025_06_01_000003_create_channels;
mod m2025_06_01_000004_create_webhooks;
mod m2025_06_01_000005_create_subscriptions;
mod m2025_06_01_000006_create_signals;
mod m2025_06_01_000007_create_deliveries;
mod m2025_06_01_000008_create_api_keys;
mod m2025_06_01_000009_create_dead_letter_entries;
mod m2025_06_01_000010_create_agent_connections;
mod m2025_06_01_000011_create_delivery_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000001_create_publishers::Migration),
            Box::new(m2025_06_01_000002_create_subscribers::Migration),
            Box::new(m2025_06_01_000003_create_channels::Migration),
            Box::new(m2025_06_01_000004_create_webhooks::Migration),
            Box::new(m2025_06_01_000005_create_subscriptions::Migration),
            Box::new(m2025_06_01_000006_create_signals::Migration),
            Box::new(m2025_06_01_000007_create_deliveries::Migration),
            Box::new(m2025_06_01_000008_create_api_keys::Migration),
            Box::new(m2025_06_01_000009_create_dead_letter_entries::Migration),
            Box::new(m2025_06_01_000010_create_agent_connections::Migration),
            Box::new(m2025_06_01_000011_create_delivery_jobs::Migration),
        ]
    }
}
