use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Actions {
    Table,
    Id,
    UserId,
    OpType,
    ActUserId,
    RepoId,
    CommentId,
    RefName,
    IsPrivate,
    Content,
    IsDeleted,
    CreatedUnix,
}

#[derive(DeriveIden)]
enum UserFeeds {
    Table,
    Id,
    UserId,
    ActivityId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // No foreign key on repo_id: feed reads inner-join repositories so rows of
        // hard-deleted repositories drop out without rewriting the log.
        manager
            .create_table(
                Table::create()
                    .table(Actions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Actions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Actions::UserId).integer().not_null())
                    .col(ColumnDef::new(Actions::OpType).integer().not_null())
                    .col(ColumnDef::new(Actions::ActUserId).integer().not_null())
                    .col(ColumnDef::new(Actions::RepoId).integer().not_null())
                    .col(ColumnDef::new(Actions::CommentId).integer().null())
                    .col(ColumnDef::new(Actions::RefName).string_len(255).null())
                    .col(
                        ColumnDef::new(Actions::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Actions::Content).text().not_null())
                    .col(
                        ColumnDef::new(Actions::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Actions::CreatedUnix).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_actions_r_u_d")
                    .table(Actions::Table)
                    .col(Actions::RepoId)
                    .col(Actions::UserId)
                    .col(Actions::IsDeleted)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_actions_au_r_c_u_d")
                    .table(Actions::Table)
                    .col(Actions::ActUserId)
                    .col(Actions::RepoId)
                    .col(Actions::CreatedUnix)
                    .col(Actions::UserId)
                    .col(Actions::IsDeleted)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_actions_c_u_d")
                    .table(Actions::Table)
                    .col(Actions::CreatedUnix)
                    .col(Actions::UserId)
                    .col(Actions::IsDeleted)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_actions_comment_id")
                    .table(Actions::Table)
                    .col(Actions::CommentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserFeeds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserFeeds::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserFeeds::UserId).integer().not_null())
                    .col(ColumnDef::new(UserFeeds::ActivityId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_feeds_activity_id")
                            .from(UserFeeds::Table, UserFeeds::ActivityId)
                            .to(Actions::Table, Actions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_feeds_user_activity")
                    .table(UserFeeds::Table)
                    .col(UserFeeds::UserId)
                    .col(UserFeeds::ActivityId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserFeeds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Actions::Table).to_owned())
            .await
    }
}
