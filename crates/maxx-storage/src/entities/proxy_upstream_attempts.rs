use sea_orm::entity::prelude::*;

/// One row per invocation of a candidate route (§3 ProxyUpstreamAttempt).
/// Ordered by `id` within a `proxy_request_id`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "proxy_upstream_attempts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub proxy_request_id: i64,
    pub route_id: i64,
    pub provider_id: i64,
    pub status: String,
    pub request_info_json: Option<Json>,
    pub response_info_json: Option<Json>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub cache_5m_write_tokens: i64,
    pub cache_1h_write_tokens: i64,
    pub cost: f64,
}

impl ActiveModelBehavior for ActiveModel {}
