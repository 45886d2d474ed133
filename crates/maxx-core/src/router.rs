//! §4.2 Router: deterministic selection of the candidate attempt list.
//! Operates purely over a `StorageSnapshot` plus a live `CooldownManager`
//! read, mirroring the teacher's read-mostly cache split (writers rebuild a
//! sorted snapshot under a write lock; readers copy references out under a
//! read lock, §5 Concurrency & Resource Model).

use std::collections::HashMap;

use maxx_common::ClientDialect;
use maxx_provider_core::cooldown::CooldownManager;
use maxx_provider_core::provider::SharedProviderAdapter;
use maxx_provider_core::registry::ProviderRegistry;
use maxx_storage::snapshot::{ProviderRow, RetryConfigRow, RouteRow, StorageSnapshot};

use crate::model_mapping::glob_match;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("no routes matched")]
    NoRoutes,
}

#[derive(Clone)]
pub struct Candidate {
    pub route_id: i64,
    pub provider_id: i64,
    pub provider_kind: String,
    pub retry_config: RetryConfigRow,
    pub adapter: SharedProviderAdapter,
}

type Survivor<'a> = (&'a RouteRow, &'a ProviderRow, SharedProviderAdapter, RetryConfigRow);

/// `match(clientDialect, projectId, requestedModel, apiTokenId) → candidates`
/// (§4.2). Model mapping is deliberately not applied here — it runs later in
/// the Executor, against the *requested* model (§4.2 closing note).
pub async fn resolve(
    snapshot: &StorageSnapshot,
    registry: &ProviderRegistry,
    cooldowns: &CooldownManager,
    client_dialect: ClientDialect,
    project_id: i64,
    requested_model: &str,
) -> Result<Vec<Candidate>, RouterError> {
    let pool = route_pool(snapshot, project_id, client_dialect);

    let mut survivors: Vec<Survivor<'_>> = Vec::new();
    for route in pool {
        let Some(provider) = snapshot.providers.iter().find(|p| p.id == route.provider_id) else {
            continue;
        };
        if !provider_supports_model(provider, requested_model) {
            continue;
        }
        if cooldowns.is_active(provider.id, client_dialect.as_str()).await {
            continue;
        }
        let Some(adapter) = registry.get(&provider.kind) else {
            continue;
        };
        let retry_config = resolve_retry_config(snapshot, route.retry_config_id);
        survivors.push((route, provider, adapter, retry_config));
    }

    if survivors.is_empty() {
        return Err(RouterError::NoRoutes);
    }

    order_by_strategy(snapshot, project_id, &mut survivors);

    Ok(survivors
        .into_iter()
        .map(|(route, provider, adapter, retry_config)| Candidate {
            route_id: route.id,
            provider_id: provider.id,
            provider_kind: provider.kind.clone(),
            retry_config,
            adapter,
        })
        .collect())
}

/// Project-specific routes only surface when the project opts its dialects
/// in (§3 Project invariant); otherwise every route falls back to the
/// global pool (`projectId = 0`).
fn route_pool(snapshot: &StorageSnapshot, project_id: i64, client_dialect: ClientDialect) -> Vec<&RouteRow> {
    let use_project = project_id != 0
        && snapshot
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .map(|p| {
                p.enabled_custom_dialects
                    .iter()
                    .any(|d| d == client_dialect.as_str())
            })
            .unwrap_or(false);

    let target_project = if use_project { project_id } else { 0 };

    snapshot
        .routes
        .iter()
        .filter(|r| r.enabled)
        .filter(|r| r.project_id == target_project)
        .filter(|r| r.client_dialect == client_dialect.as_str())
        .collect()
}

fn provider_supports_model(provider: &ProviderRow, requested_model: &str) -> bool {
    if provider.supported_models.is_empty() {
        return true;
    }
    provider
        .supported_models
        .iter()
        .any(|pattern| glob_match(pattern, requested_model))
}

fn resolve_retry_config(snapshot: &StorageSnapshot, retry_config_id: i64) -> RetryConfigRow {
    if retry_config_id != 0
        && let Some(found) = snapshot.retry_configs.iter().find(|r| r.id == retry_config_id)
    {
        return found.clone();
    }
    snapshot
        .retry_configs
        .iter()
        .find(|r| r.is_default)
        .cloned()
        .unwrap_or(RetryConfigRow {
            id: 0,
            is_default: true,
            max_retries: 0,
            initial_interval_ms: 1000,
            backoff_rate: 2.0,
            max_interval_ms: 30_000,
        })
}

/// Resolve routing strategy project → global → default priority (§3
/// RoutingStrategy, §4.2 step 3/4).
fn order_by_strategy(snapshot: &StorageSnapshot, project_id: i64, survivors: &mut Vec<Survivor<'_>>) {
    let strategy = snapshot
        .routing_strategies
        .iter()
        .find(|s| s.project_id == project_id)
        .or_else(|| snapshot.routing_strategies.iter().find(|s| s.project_id == 0));

    match strategy.map(|s| s.kind.as_str()) {
        Some("weighted-random") => {
            let weights: HashMap<i64, f64> = strategy
                .and_then(|s| s.config_json.get("weights"))
                .and_then(|v| v.as_object())
                .map(|obj| {
                    obj.iter()
                        .filter_map(|(k, v)| Some((k.parse::<i64>().ok()?, v.as_f64()?)))
                        .collect()
                })
                .unwrap_or_default();
            weighted_shuffle(survivors, &weights);
        }
        _ => {
            survivors.sort_by(|a, b| a.0.position.cmp(&b.0.position).then(a.0.id.cmp(&b.0.id)));
        }
    }
}

/// Weighted shuffle without replacement, absent weight defaults to `1`
/// (§4.2 step 4 "weighted-random"): repeatedly draw from the remaining pool
/// with probability proportional to weight, keyed by route id.
fn weighted_shuffle(survivors: &mut Vec<Survivor<'_>>, weights: &HashMap<i64, f64>) {
    use rand::Rng;
    let mut rng = rand::rng();
    let mut pool = std::mem::take(survivors);
    let mut out = Vec::with_capacity(pool.len());
    while !pool.is_empty() {
        let total: f64 = pool
            .iter()
            .map(|(route, ..)| weights.get(&route.id).copied().unwrap_or(1.0).max(0.0))
            .sum();
        let mut pick = if total > 0.0 { rng.random_range(0.0..total) } else { 0.0 };
        let mut idx = pool.len() - 1;
        for (i, (route, ..)) in pool.iter().enumerate() {
            let w = weights.get(&route.id).copied().unwrap_or(1.0).max(0.0);
            if pick < w {
                idx = i;
                break;
            }
            pick -= w;
        }
        out.push(pool.remove(idx));
    }
    *survivors = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxx_provider_core::events::EventHub;

    fn retry_config(id: i64, is_default: bool) -> RetryConfigRow {
        RetryConfigRow {
            id,
            is_default,
            max_retries: 2,
            initial_interval_ms: 100,
            backoff_rate: 2.0,
            max_interval_ms: 1000,
        }
    }

    fn provider(id: i64, kind: &str) -> ProviderRow {
        ProviderRow {
            id,
            kind: kind.to_string(),
            name: format!("p{id}"),
            config_json: serde_json::json!({}),
            supported_client_dialects: vec!["claude".to_string()],
            supported_models: Vec::new(),
            updated_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn route(id: i64, provider_id: i64, position: i32) -> RouteRow {
        RouteRow {
            id,
            enabled: true,
            is_native: true,
            project_id: 0,
            client_dialect: "claude".to_string(),
            provider_id,
            position,
            retry_config_id: 0,
        }
    }

    struct NoopAdapter;

    #[async_trait::async_trait]
    impl maxx_provider_core::provider::ProviderAdapter for NoopAdapter {
        fn kind(&self) -> &'static str {
            "custom"
        }
        fn supported_dialects(&self) -> &'static [&'static str] {
            &["claude"]
        }
        async fn execute(
            &self,
            _ctx: &maxx_provider_core::provider::ExecutionContext,
            _config: &maxx_provider_core::config::ProviderConfig,
            _writer: maxx_provider_core::provider::ClientWriter,
            _request: maxx_provider_core::provider::UpstreamInvocation,
            _events: tokio::sync::mpsc::Sender<maxx_provider_core::events::AdapterEvent>,
        ) -> Result<(), maxx_provider_core::errors::ProxyError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn orders_by_position_then_id() {
        let mut snapshot = StorageSnapshot::default();
        snapshot.providers = vec![provider(1, "custom"), provider(2, "custom")];
        snapshot.routes = vec![route(10, 2, 5), route(11, 1, 1)];
        snapshot.retry_configs = vec![retry_config(1, true)];

        let mut registry = ProviderRegistry::new();
        registry.register(std::sync::Arc::new(NoopAdapter));

        let cooldowns = CooldownManager::new(EventHub::new(16));
        let candidates = resolve(
            &snapshot,
            &registry,
            &cooldowns,
            ClientDialect::Claude,
            0,
            "claude-3-5-sonnet",
        )
        .await
        .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].provider_id, 1);
        assert_eq!(candidates[1].provider_id, 2);
    }

    #[tokio::test]
    async fn excludes_providers_in_active_cooldown() {
        let mut snapshot = StorageSnapshot::default();
        snapshot.providers = vec![provider(1, "custom")];
        snapshot.routes = vec![route(10, 1, 1)];
        snapshot.retry_configs = vec![retry_config(1, true)];

        let mut registry = ProviderRegistry::new();
        registry.register(std::sync::Arc::new(NoopAdapter));

        let cooldowns = CooldownManager::new(EventHub::new(16));
        cooldowns
            .record(1, "claude", maxx_provider_core::cooldown::CooldownReason::ServerError, None)
            .await;

        let result = resolve(&snapshot, &registry, &cooldowns, ClientDialect::Claude, 0, "m").await;
        assert!(matches!(result, Err(RouterError::NoRoutes)));
    }

    #[tokio::test]
    async fn empty_supported_models_matches_everything() {
        let mut snapshot = StorageSnapshot::default();
        let mut p = provider(1, "custom");
        p.supported_models = vec!["gpt-4*".to_string()];
        snapshot.providers = vec![p];
        snapshot.routes = vec![route(10, 1, 1)];
        snapshot.retry_configs = vec![retry_config(1, true)];

        let mut registry = ProviderRegistry::new();
        registry.register(std::sync::Arc::new(NoopAdapter));
        let cooldowns = CooldownManager::new(EventHub::new(16));

        assert!(resolve(&snapshot, &registry, &cooldowns, ClientDialect::Claude, 0, "claude-3")
            .await
            .is_err());
        assert!(resolve(&snapshot, &registry, &cooldowns, ClientDialect::Claude, 0, "gpt-4-turbo")
            .await
            .is_ok());
    }
}
