use sea_orm::entity::prelude::*;

/// Exactly one row has `is_default = true` (§3 RetryConfig); enforced by
/// `SeaOrmStorage::ensure_default_retry_config` at bootstrap.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "retry_configs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub is_default: bool,
    pub max_retries: i32,
    pub initial_interval_ms: i64,
    pub backoff_rate: f64,
    pub max_interval_ms: i64,
}

impl ActiveModelBehavior for ActiveModel {}
