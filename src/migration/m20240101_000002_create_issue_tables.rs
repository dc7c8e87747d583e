use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Issues {
    Table,
    Id,
    RepoId,
    Index,
    PosterId,
    Title,
    Content,
    IsPull,
    IsClosed,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    IssueId,
    PosterId,
    Content,
    CreatedAt,
}

#[derive(DeriveIden)]
enum IssueWatches {
    Table,
    Id,
    UserId,
    IssueId,
    IsWatching,
}

#[derive(DeriveIden)]
enum Repositories {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Issues::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Issues::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Issues::RepoId).integer().not_null())
                    .col(ColumnDef::new(Issues::Index).big_integer().not_null())
                    .col(ColumnDef::new(Issues::PosterId).integer().not_null())
                    .col(ColumnDef::new(Issues::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Issues::Content).text().not_null())
                    .col(
                        ColumnDef::new(Issues::IsPull)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Issues::IsClosed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Issues::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_repo_id")
                            .from(Issues::Table, Issues::RepoId)
                            .to(Repositories::Table, Repositories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issues_repo_index")
                    .table(Issues::Table)
                    .col(Issues::RepoId)
                    .col(Issues::Index)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Comments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Comments::IssueId).integer().not_null())
                    .col(ColumnDef::new(Comments::PosterId).integer().not_null())
                    .col(ColumnDef::new(Comments::Content).text().not_null())
                    .col(
                        ColumnDef::new(Comments::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_issue_id")
                    .table(Comments::Table)
                    .col(Comments::IssueId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IssueWatches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IssueWatches::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IssueWatches::UserId).integer().not_null())
                    .col(ColumnDef::new(IssueWatches::IssueId).integer().not_null())
                    .col(
                        ColumnDef::new(IssueWatches::IsWatching)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issue_watches_user_issue")
                    .table(IssueWatches::Table)
                    .col(IssueWatches::UserId)
                    .col(IssueWatches::IssueId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IssueWatches::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Issues::Table).to_owned())
            .await
    }
}
