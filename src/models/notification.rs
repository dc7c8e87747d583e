use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "i16", db_type = "SmallInteger")]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[sea_orm(num_value = 1)]
    Unread,
    #[sea_orm(num_value = 2)]
    Read,
    #[sea_orm(num_value = 3)]
    Pinned,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "i16", db_type = "SmallInteger")]
#[serde(rename_all = "snake_case")]
pub enum NotificationSource {
    #[sea_orm(num_value = 1)]
    Issue,
    #[sea_orm(num_value = 2)]
    PullRequest,
    #[sea_orm(num_value = 3)]
    Commit,
    #[sea_orm(num_value = 4)]
    Repository,
}

impl NotificationSource {
    pub fn for_issue(is_pull: bool) -> Self {
        if is_pull {
            NotificationSource::PullRequest
        } else {
            NotificationSource::Issue
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub repo_id: i32,
    pub status: NotificationStatus,
    pub source: NotificationSource,
    /// 0 for repository and commit notifications.
    pub issue_id: i32,
    pub commit_id: Option<String>,
    pub comment_id: Option<i32>,
    pub updated_by: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl ActiveModelBehavior for ActiveModel {}
