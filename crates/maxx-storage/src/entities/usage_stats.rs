use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// Time-bucketed aggregate (§3 UsageStats). Granularities roll up
/// `minute → hour → day → week → month`; the stats aggregator background
/// loop (§4.8) folds finer buckets into coarser ones on a timer.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "usage_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// `minute` | `hour` | `day` | `week` | `month`.
    pub granularity: String,
    pub bucket_start: OffsetDateTime,
    pub route_id: i64,
    pub provider_id: i64,
    pub project_id: i64,
    pub api_token_id: i64,
    pub client_dialect: String,
    pub model: String,
    pub request_count: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub cost: f64,
}

impl ActiveModelBehavior for ActiveModel {}
