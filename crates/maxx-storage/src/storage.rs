use async_trait::async_trait;
use maxx_common::GlobalConfig;
use time::OffsetDateTime;

use crate::snapshot::StorageSnapshot;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("db error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("serde json error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Default)]
pub struct TokenMetrics {
    pub input: i64,
    pub output: i64,
    pub cache_read: i64,
    pub cache_write: i64,
    pub cache_5m_write: i64,
    pub cache_1h_write: i64,
}

#[derive(Debug, Clone)]
pub struct NewProxyRequest {
    pub request_id: String,
    pub session_id: String,
    pub client_dialect: String,
    pub instance_id: String,
    pub request_info_json: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct NewUpstreamAttempt {
    pub proxy_request_id: i64,
    pub route_id: i64,
    pub provider_id: i64,
}

/// Persistence surface for the dispatch engine (§3 Data Model, §4.6
/// Executor, §4.7 Request Tracker, §4.8 Background Loops).
///
/// Runtime routing decisions read from the in-memory `StorageSnapshot`
/// published by the Router's `arc-swap` cache, not from here; this trait is
/// used for bootstrap (`load_snapshot`), admin mutations, and persisting the
/// lifecycle of requests/attempts/usage as they happen.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn sync(&self) -> StorageResult<()>;

    async fn load_global_config(&self) -> StorageResult<Option<GlobalConfig>>;
    async fn upsert_global_config(&self, config: &GlobalConfig) -> StorageResult<()>;

    async fn load_snapshot(&self) -> StorageResult<StorageSnapshot>;

    async fn ensure_default_retry_config(&self) -> StorageResult<i64>;

    // ProxyRequest lifecycle (§3 ProxyRequest).
    async fn create_proxy_request(&self, req: NewProxyRequest) -> StorageResult<i64>;
    async fn mark_proxy_request_in_progress(&self, id: i64) -> StorageResult<()>;
    async fn complete_proxy_request(
        &self,
        id: i64,
        status: &str,
        response_info_json: Option<serde_json::Value>,
        error_message: Option<String>,
        final_attempt_id: Option<i64>,
        tokens: TokenMetrics,
        cost: f64,
    ) -> StorageResult<()>;
    /// Startup recovery (§3 ProxyRequest invariant, §4.8 Background Loops):
    /// any non-terminal row owned by `instance_id` is a crash orphan and is
    /// marked FAILED with `end_time` set to now.
    async fn recover_orphaned_requests(&self, instance_id: &str) -> StorageResult<u64>;

    // ProxyUpstreamAttempt (§3 ProxyUpstreamAttempt).
    async fn create_upstream_attempt(&self, attempt: NewUpstreamAttempt) -> StorageResult<i64>;
    async fn complete_upstream_attempt(
        &self,
        id: i64,
        status: &str,
        response_info_json: Option<serde_json::Value>,
        tokens: TokenMetrics,
        cost: f64,
    ) -> StorageResult<()>;

    // Cooldown (§3 Cooldown, §4.3 Cooldown Manager).
    async fn upsert_cooldown(
        &self,
        provider_id: i64,
        client_dialect: &str,
        reason: &str,
        until: OffsetDateTime,
        failure_count: i32,
    ) -> StorageResult<()>;
    async fn clear_cooldown(&self, provider_id: i64, client_dialect: &str) -> StorageResult<()>;
    async fn gc_expired_cooldowns(&self, now: OffsetDateTime) -> StorageResult<u64>;

    // FailureCount (§3 FailureCount).
    async fn bump_failure_count(&self, provider_id: i64, client_dialect: &str) -> StorageResult<i32>;
    async fn clear_failure_count(&self, provider_id: i64, client_dialect: &str) -> StorageResult<()>;

    // Usage stats (§3 UsageStats, §4.8 stats aggregator loop).
    async fn bump_usage_stats(
        &self,
        granularity: &str,
        bucket_start: OffsetDateTime,
        route_id: i64,
        provider_id: i64,
        project_id: i64,
        api_token_id: i64,
        client_dialect: &str,
        model: &str,
        tokens: TokenMetrics,
        cost: f64,
    ) -> StorageResult<()>;
    async fn rollup_usage_stats(
        &self,
        from_granularity: &str,
        to_granularity: &str,
        bucket_start: OffsetDateTime,
    ) -> StorageResult<()>;
}
