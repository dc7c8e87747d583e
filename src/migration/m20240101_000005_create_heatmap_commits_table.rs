use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum HeatmapCommits {
    Table,
    Id,
    UserId,
    RepoId,
    CommitSha,
    CommitTimestamp,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HeatmapCommits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HeatmapCommits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HeatmapCommits::UserId).integer().not_null())
                    .col(ColumnDef::new(HeatmapCommits::RepoId).integer().not_null())
                    .col(
                        ColumnDef::new(HeatmapCommits::CommitSha)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HeatmapCommits::CommitTimestamp)
                            .big_integer()
                            .not_null(),
                    )
                    .check(Expr::col(HeatmapCommits::CommitTimestamp).gt(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_heatmap_commits_user_time")
                    .table(HeatmapCommits::Table)
                    .col(HeatmapCommits::UserId)
                    .col(HeatmapCommits::CommitTimestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_heatmap_commits_repo_id")
                    .table(HeatmapCommits::Table)
                    .col(HeatmapCommits::RepoId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HeatmapCommits::Table).to_owned())
            .await
    }
}
