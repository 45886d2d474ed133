use sea_orm::entity::prelude::*;

/// Lookup priority is route > provider > global; within a scope, by
/// `priority` then `id` (§3 ModelMapping). `pattern` matches the requested
/// model as a glob or an exact string.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "model_mappings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// `route` | `provider` | `global`.
    pub scope: String,
    pub client_dialect: String,
    pub provider_kind: Option<String>,
    pub provider_id: Option<i64>,
    pub project_id: Option<i64>,
    pub route_id: Option<i64>,
    pub api_token_id: Option<i64>,
    pub pattern: String,
    pub target: String,
    pub priority: i32,
}

impl ActiveModelBehavior for ActiveModel {}
