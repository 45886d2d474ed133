use sea_orm::entity::prelude::*;

/// Binds `(project, client dialect)` to a provider at a given priority
/// position (§3 Route). Invariant `(project_id, provider_id, client_dialect)`
/// unique is enforced at the application layer rather than the schema: the
/// project/route admin surface is out of scope for this dispatch-focused
/// build (see SPEC_FULL.md Non-goals).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "routes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub enabled: bool,
    pub is_native: bool,
    /// 0 = global route, not scoped to a project.
    pub project_id: i64,
    pub client_dialect: String,
    pub provider_id: i64,
    pub position: i32,
    /// 0 = use the system default RetryConfig.
    pub retry_config_id: i64,
}

impl ActiveModelBehavior for ActiveModel {}
