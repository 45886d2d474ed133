use maxx_common::GlobalConfig;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct GlobalConfigRow {
    pub id: i64,
    pub config: GlobalConfig,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct ProviderRow {
    pub id: i64,
    pub kind: String,
    pub name: String,
    pub config_json: JsonValue,
    pub supported_client_dialects: Vec<String>,
    pub supported_models: Vec<String>,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct RouteRow {
    pub id: i64,
    pub enabled: bool,
    pub is_native: bool,
    pub project_id: i64,
    pub client_dialect: String,
    pub provider_id: i64,
    pub position: i32,
    pub retry_config_id: i64,
}

#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub enabled_custom_dialects: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RoutingStrategyRow {
    pub id: i64,
    pub project_id: i64,
    pub kind: String,
    pub config_json: JsonValue,
}

#[derive(Debug, Clone)]
pub struct RetryConfigRow {
    pub id: i64,
    pub is_default: bool,
    pub max_retries: i32,
    pub initial_interval_ms: i64,
    pub backoff_rate: f64,
    pub max_interval_ms: i64,
}

#[derive(Debug, Clone)]
pub struct ModelMappingRow {
    pub id: i64,
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

/// Read-only materialisation of the routing-relevant tables, rebuilt at
/// bootstrap and on every admin mutation, then published into the Router's
/// `arc-swap`'d cache (§4.2 Router: "runtime reads must not hit the DB").
#[derive(Debug, Clone, Default)]
pub struct StorageSnapshot {
    pub global_config: Option<GlobalConfigRow>,
    pub providers: Vec<ProviderRow>,
    pub routes: Vec<RouteRow>,
    pub projects: Vec<ProjectRow>,
    pub routing_strategies: Vec<RoutingStrategyRow>,
    pub retry_configs: Vec<RetryConfigRow>,
    pub model_mappings: Vec<ModelMappingRow>,
}
