use sea_orm::entity::prelude::*;

/// Derived registry of model identifiers observed or declared by providers
/// (§3 ResponseModel/ModelPrice).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "response_models")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "response_model_name")]
    pub name: String,
    pub provider_kind: String,
}

impl ActiveModelBehavior for ActiveModel {}
