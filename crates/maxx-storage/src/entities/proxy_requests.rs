use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// One row per client request (§3 ProxyRequest). Created PENDING at
/// admission, advances to IN_PROGRESS on the first attempt, terminates at
/// COMPLETED or FAILED with `end_time` set.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "proxy_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "request_uuid")]
    pub request_id: String,
    pub session_id: String,
    pub client_dialect: String,
    pub start_time: OffsetDateTime,
    pub end_time: Option<OffsetDateTime>,
    pub duration_ms: Option<i64>,
    /// `PENDING` | `IN_PROGRESS` | `COMPLETED` | `FAILED`.
    pub status: String,
    /// Identifies the process instance that owns this row; used at startup
    /// to recover rows orphaned by a crash (§4.8 Background Loops).
    pub instance_id: String,
    pub request_info_json: Option<Json>,
    pub response_info_json: Option<Json>,
    pub error_message: Option<String>,
    pub attempt_count: i32,
    pub final_attempt_id: Option<i64>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub cache_5m_write_tokens: i64,
    pub cache_1h_write_tokens: i64,
    pub cost: f64,
    #[sea_orm(has_many)]
    pub attempts: HasMany<super::proxy_upstream_attempts::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
