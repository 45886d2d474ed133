pub mod cooldowns;
pub mod failure_counts;
pub mod global_config;
pub mod model_mappings;
pub mod model_prices;
pub mod projects;
pub mod providers;
pub mod proxy_requests;
pub mod proxy_upstream_attempts;
pub mod response_models;
pub mod retry_configs;
pub mod routes;
pub mod routing_strategies;
pub mod sessions;
pub mod usage_stats;

pub use cooldowns::Entity as Cooldowns;
pub use failure_counts::Entity as FailureCounts;
pub use global_config::Entity as GlobalConfig;
pub use model_mappings::Entity as ModelMappings;
pub use model_prices::Entity as ModelPrices;
pub use projects::Entity as Projects;
pub use providers::Entity as Providers;
pub use proxy_requests::Entity as ProxyRequests;
pub use proxy_upstream_attempts::Entity as ProxyUpstreamAttempts;
pub use response_models::Entity as ResponseModels;
pub use retry_configs::Entity as RetryConfigs;
pub use routes::Entity as Routes;
pub use routing_strategies::Entity as RoutingStrategies;
pub use sessions::Entity as Sessions;
pub use usage_stats::Entity as UsageStats;
