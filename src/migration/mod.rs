use sea_orm_migration::prelude::*;

mod m20240101_000001_create_identity_tables;
mod m20240101_000002_create_issue_tables;
mod m20240101_000003_create_actions_table;
mod m20240101_000004_create_notifications_table;
mod m20240101_000005_create_heatmap_commits_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_identity_tables::Migration),
            Box::new(m20240101_000002_create_issue_tables::Migration),
            Box::new(m20240101_000003_create_actions_table::Migration),
            Box::new(m20240101_000004_create_notifications_table::Migration),
            Box::new(m20240101_000005_create_heatmap_commits_table::Migration),
        ]
    }
}
