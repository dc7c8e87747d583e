use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Who may see a user (or organization) and the repositories it owns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "i16", db_type = "SmallInteger")]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[sea_orm(num_value = 0)]
    Public,
    /// Visible to signed-in users only.
    #[sea_orm(num_value = 1)]
    Limited,
    #[sea_orm(num_value = 2)]
    Private,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub full_name: String,
    pub is_admin: bool,
    pub is_organization: bool,
    pub visibility: Visibility,
    pub keep_activity_private: bool,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub const GHOST_USER_ID: i32 = -1;

impl Model {
    /// Placeholder for actors whose account no longer exists.
    pub fn ghost() -> Self {
        Self {
            id: GHOST_USER_ID,
            name: "Ghost".to_string(),
            full_name: "Ghost".to_string(),
            is_admin: false,
            is_organization: false,
            visibility: Visibility::Public,
            keep_activity_private: false,
            created_at: DateTime::default(),
        }
    }

    pub fn is_ghost(&self) -> bool {
        self.id == GHOST_USER_ID
    }
}
