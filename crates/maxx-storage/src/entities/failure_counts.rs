use sea_orm::entity::prelude::*;

/// `(provider_id, client_dialect)` counter cleared on first success; the
/// backoff policy's input (§3 FailureCount).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "failure_counts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub provider_id: i64,
    pub client_dialect: String,
    pub count: i32,
}

impl ActiveModelBehavior for ActiveModel {}
