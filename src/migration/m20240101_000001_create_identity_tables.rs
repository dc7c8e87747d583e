use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    FullName,
    IsAdmin,
    IsOrganization,
    Visibility,
    KeepActivityPrivate,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Repositories {
    Table,
    Id,
    OwnerId,
    Name,
    IsPrivate,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RepoUnits {
    Table,
    Id,
    RepoId,
    UnitType,
}

#[derive(DeriveIden)]
enum Collaborations {
    Table,
    Id,
    RepoId,
    UserId,
}

#[derive(DeriveIden)]
enum Teams {
    Table,
    Id,
    OrgId,
    Name,
    IncludesAllRepositories,
}

#[derive(DeriveIden)]
enum TeamUsers {
    Table,
    Id,
    OrgId,
    TeamId,
    UserId,
}

#[derive(DeriveIden)]
enum TeamRepos {
    Table,
    Id,
    OrgId,
    TeamId,
    RepoId,
}

#[derive(DeriveIden)]
enum TeamUnits {
    Table,
    Id,
    TeamId,
    UnitType,
    AccessMode,
}

#[derive(DeriveIden)]
enum Watches {
    Table,
    Id,
    UserId,
    RepoId,
    Mode,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Name)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::FullName)
                            .string_len(255)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Users::IsAdmin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::IsOrganization)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::Visibility)
                            .small_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::KeepActivityPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Repositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Repositories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Repositories::OwnerId).integer().not_null())
                    .col(ColumnDef::new(Repositories::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Repositories::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Repositories::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repositories_owner_id")
                            .from(Repositories::Table, Repositories::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RepoUnits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RepoUnits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RepoUnits::RepoId).integer().not_null())
                    .col(ColumnDef::new(RepoUnits::UnitType).small_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repo_units_repo_id")
                            .from(RepoUnits::Table, RepoUnits::RepoId)
                            .to(Repositories::Table, Repositories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repo_units_repo_type")
                    .table(RepoUnits::Table)
                    .col(RepoUnits::RepoId)
                    .col(RepoUnits::UnitType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Collaborations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Collaborations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Collaborations::RepoId).integer().not_null())
                    .col(ColumnDef::new(Collaborations::UserId).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_collaborations_repo_user")
                    .table(Collaborations::Table)
                    .col(Collaborations::RepoId)
                    .col(Collaborations::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Teams::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Teams::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Teams::OrgId).integer().not_null())
                    .col(ColumnDef::new(Teams::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Teams::IncludesAllRepositories)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TeamUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TeamUsers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TeamUsers::OrgId).integer().not_null())
                    .col(ColumnDef::new(TeamUsers::TeamId).integer().not_null())
                    .col(ColumnDef::new(TeamUsers::UserId).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_team_users_user_org")
                    .table(TeamUsers::Table)
                    .col(TeamUsers::UserId)
                    .col(TeamUsers::OrgId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TeamRepos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TeamRepos::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TeamRepos::OrgId).integer().not_null())
                    .col(ColumnDef::new(TeamRepos::TeamId).integer().not_null())
                    .col(ColumnDef::new(TeamRepos::RepoId).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TeamUnits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TeamUnits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TeamUnits::TeamId).integer().not_null())
                    .col(ColumnDef::new(TeamUnits::UnitType).small_integer().not_null())
                    .col(
                        ColumnDef::new(TeamUnits::AccessMode)
                            .small_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Watches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Watches::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Watches::UserId).integer().not_null())
                    .col(ColumnDef::new(Watches::RepoId).integer().not_null())
                    .col(
                        ColumnDef::new(Watches::Mode)
                            .small_integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_watches_repo_user")
                    .table(Watches::Table)
                    .col(Watches::RepoId)
                    .col(Watches::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Watches::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TeamUnits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TeamRepos::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TeamUsers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teams::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Collaborations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RepoUnits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repositories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}
