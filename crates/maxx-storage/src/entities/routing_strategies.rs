use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "routing_strategies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// 0 = global strategy.
    pub project_id: i64,
    /// `priority` | `weighted-random` (§3 RoutingStrategy).
    pub kind: String,
    pub config_json: Json,
}

impl ActiveModelBehavior for ActiveModel {}
