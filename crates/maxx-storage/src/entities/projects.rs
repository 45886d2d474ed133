use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(unique_key = "project_slug")]
    pub slug: String,
    /// Client dialects for which this project's own routes override the
    /// global ones (§3 Project.enabledCustomDialects).
    pub enabled_custom_dialects_json: Json,
}

impl ActiveModelBehavior for ActiveModel {}
