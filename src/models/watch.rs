use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i16", db_type = "SmallInteger")]
#[serde(rename_all = "snake_case")]
pub enum WatchMode {
    #[sea_orm(num_value = 0)]
    None,
    #[sea_orm(num_value = 1)]
    Normal,
    /// Explicitly opted out.
    #[sea_orm(num_value = 2)]
    Dont,
    /// Watching because the user contributed to the repository.
    #[sea_orm(num_value = 3)]
    Auto,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "watches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub repo_id: i32,
    pub mode: WatchMode,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl WatchMode {
    pub fn is_watching(self) -> bool {
        matches!(self, WatchMode::Normal | WatchMode::Auto)
    }
}
