use async_trait::async_trait;
use maxx_common::GlobalConfig;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Schema,
};
use time::OffsetDateTime;

use crate::entities::{
    cooldowns, failure_counts, global_config, model_mappings, projects, providers,
    proxy_requests, proxy_upstream_attempts, retry_configs, routes, routing_strategies,
};
use crate::snapshot::{
    GlobalConfigRow, ModelMappingRow, ProjectRow, ProviderRow, RetryConfigRow, RouteRow,
    RoutingStrategyRow, StorageSnapshot,
};
use crate::storage::{NewProxyRequest, NewUpstreamAttempt, Storage, StorageResult, TokenMetrics};

/// `Storage` backed by `sea-orm`, the way `maxx-storage`'s `TrafficStorage`
/// wraps a `DatabaseConnection` (one struct per backend choice, schema
/// sync driven by the entity definitions rather than hand-written SQL).
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
}

impl SeaOrmStorage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn json_str_vec(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Storage for SeaOrmStorage {
    async fn sync(&self) -> StorageResult<()> {
        Schema::new(self.db.get_database_backend())
            .builder()
            .register(global_config::Entity)
            .register(providers::Entity)
            .register(routes::Entity)
            .register(projects::Entity)
            .register(routing_strategies::Entity)
            .register(retry_configs::Entity)
            .register(cooldowns::Entity)
            .register(failure_counts::Entity)
            .register(proxy_requests::Entity)
            .register(proxy_upstream_attempts::Entity)
            .register(crate::entities::sessions::Entity)
            .register(model_mappings::Entity)
            .register(crate::entities::response_models::Entity)
            .register(crate::entities::model_prices::Entity)
            .register(crate::entities::usage_stats::Entity)
            .sync(&self.db)
            .await?;
        self.ensure_default_retry_config().await?;
        Ok(())
    }

    async fn load_global_config(&self) -> StorageResult<Option<GlobalConfig>> {
        let row = global_config::Entity::find().one(&self.db).await?;
        Ok(match row {
            Some(row) => Some(serde_json::from_value(row.config_json)?),
            None => None,
        })
    }

    async fn upsert_global_config(&self, config: &GlobalConfig) -> StorageResult<()> {
        let existing = global_config::Entity::find().one(&self.db).await?;
        let config_json = serde_json::to_value(config)?;
        match existing {
            Some(row) => {
                let mut active: global_config::ActiveModel = row.into();
                active.config_json = Set(config_json);
                active.updated_at = Set(now());
                active.update(&self.db).await?;
            }
            None => {
                let active = global_config::ActiveModel {
                    id: Set(1),
                    config_json: Set(config_json),
                    updated_at: Set(now()),
                };
                active.insert(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn load_snapshot(&self) -> StorageResult<StorageSnapshot> {
        let global_config_row = global_config::Entity::find().one(&self.db).await?;
        let global_config = match global_config_row {
            Some(row) => Some(GlobalConfigRow {
                id: row.id,
                config: serde_json::from_value(row.config_json)?,
                updated_at: row.updated_at,
            }),
            None => None,
        };

        let providers = providers::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| ProviderRow {
                id: row.id,
                kind: row.kind,
                name: row.name,
                supported_client_dialects: json_str_vec(&row.supported_client_dialects_json),
                supported_models: json_str_vec(&row.supported_models_json),
                config_json: row.config_json,
                updated_at: row.updated_at,
            })
            .collect();

        let routes = routes::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| RouteRow {
                id: row.id,
                enabled: row.enabled,
                is_native: row.is_native,
                project_id: row.project_id,
                client_dialect: row.client_dialect,
                provider_id: row.provider_id,
                position: row.position,
                retry_config_id: row.retry_config_id,
            })
            .collect();

        let projects = projects::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| ProjectRow {
                id: row.id,
                name: row.name,
                slug: row.slug,
                enabled_custom_dialects: json_str_vec(&row.enabled_custom_dialects_json),
            })
            .collect();

        let routing_strategies = routing_strategies::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| RoutingStrategyRow {
                id: row.id,
                project_id: row.project_id,
                kind: row.kind,
                config_json: row.config_json,
            })
            .collect();

        let retry_configs = retry_configs::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| RetryConfigRow {
                id: row.id,
                is_default: row.is_default,
                max_retries: row.max_retries,
                initial_interval_ms: row.initial_interval_ms,
                backoff_rate: row.backoff_rate,
                max_interval_ms: row.max_interval_ms,
            })
            .collect();

        let model_mappings = model_mappings::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| ModelMappingRow {
                id: row.id,
                scope: row.scope,
                client_dialect: row.client_dialect,
                provider_kind: row.provider_kind,
                provider_id: row.provider_id,
                project_id: row.project_id,
                route_id: row.route_id,
                api_token_id: row.api_token_id,
                pattern: row.pattern,
                target: row.target,
                priority: row.priority,
            })
            .collect();

        Ok(StorageSnapshot {
            global_config,
            providers,
            routes,
            projects,
            routing_strategies,
            retry_configs,
            model_mappings,
        })
    }

    async fn ensure_default_retry_config(&self) -> StorageResult<i64> {
        if let Some(existing) = retry_configs::Entity::find()
            .filter(retry_configs::Column::IsDefault.eq(true))
            .one(&self.db)
            .await?
        {
            return Ok(existing.id);
        }
        let active = retry_configs::ActiveModel {
            id: Default::default(),
            is_default: Set(true),
            max_retries: Set(3),
            initial_interval_ms: Set(500),
            backoff_rate: Set(2.0),
            max_interval_ms: Set(30_000),
        };
        let inserted = active.insert(&self.db).await?;
        Ok(inserted.id)
    }

    async fn create_proxy_request(&self, req: NewProxyRequest) -> StorageResult<i64> {
        let active = proxy_requests::ActiveModel {
            id: Default::default(),
            request_id: Set(req.request_id),
            session_id: Set(req.session_id),
            client_dialect: Set(req.client_dialect),
            start_time: Set(now()),
            end_time: Set(None),
            duration_ms: Set(None),
            status: Set("PENDING".to_string()),
            instance_id: Set(req.instance_id),
            request_info_json: Set(req.request_info_json),
            response_info_json: Set(None),
            error_message: Set(None),
            attempt_count: Set(0),
            final_attempt_id: Set(None),
            input_tokens: Set(0),
            output_tokens: Set(0),
            cache_read_tokens: Set(0),
            cache_write_tokens: Set(0),
            cache_5m_write_tokens: Set(0),
            cache_1h_write_tokens: Set(0),
            cost: Set(0.0),
        };
        let inserted = active.insert(&self.db).await?;
        Ok(inserted.id)
    }

    async fn mark_proxy_request_in_progress(&self, id: i64) -> StorageResult<()> {
        let row = proxy_requests::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| crate::storage::StorageError::NotFound(format!("proxy_request {id}")))?;
        let mut active: proxy_requests::ActiveModel = row.into();
        active.status = Set("IN_PROGRESS".to_string());
        active.update(&self.db).await?;
        Ok(())
    }

    async fn complete_proxy_request(
        &self,
        id: i64,
        status: &str,
        response_info_json: Option<serde_json::Value>,
        error_message: Option<String>,
        final_attempt_id: Option<i64>,
        tokens: TokenMetrics,
        cost: f64,
    ) -> StorageResult<()> {
        let row = proxy_requests::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| crate::storage::StorageError::NotFound(format!("proxy_request {id}")))?;
        let start_time = row.start_time;
        let end_time = now();
        let mut active: proxy_requests::ActiveModel = row.into();
        active.status = Set(status.to_string());
        active.end_time = Set(Some(end_time));
        active.duration_ms = Set(Some(((end_time - start_time).whole_milliseconds()) as i64));
        active.response_info_json = Set(response_info_json);
        active.error_message = Set(error_message);
        active.final_attempt_id = Set(final_attempt_id);
        active.input_tokens = Set(tokens.input);
        active.output_tokens = Set(tokens.output);
        active.cache_read_tokens = Set(tokens.cache_read);
        active.cache_write_tokens = Set(tokens.cache_write);
        active.cache_5m_write_tokens = Set(tokens.cache_5m_write);
        active.cache_1h_write_tokens = Set(tokens.cache_1h_write);
        active.cost = Set(cost);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn recover_orphaned_requests(&self, instance_id: &str) -> StorageResult<u64> {
        let orphans = proxy_requests::Entity::find()
            .filter(proxy_requests::Column::InstanceId.eq(instance_id))
            .filter(proxy_requests::Column::Status.is_not_in(["COMPLETED", "FAILED"]))
            .all(&self.db)
            .await?;
        let count = orphans.len() as u64;
        let end_time = now();
        for row in orphans {
            let mut active: proxy_requests::ActiveModel = row.into();
            active.status = Set("FAILED".to_string());
            active.end_time = Set(Some(end_time));
            active.error_message = Set(Some("recovered at startup: owning instance crashed".to_string()));
            active.update(&self.db).await?;
        }
        Ok(count)
    }

    async fn create_upstream_attempt(&self, attempt: NewUpstreamAttempt) -> StorageResult<i64> {
        let active = proxy_upstream_attempts::ActiveModel {
            id: Default::default(),
            proxy_request_id: Set(attempt.proxy_request_id),
            route_id: Set(attempt.route_id),
            provider_id: Set(attempt.provider_id),
            status: Set("IN_PROGRESS".to_string()),
            request_info_json: Set(None),
            response_info_json: Set(None),
            input_tokens: Set(0),
            output_tokens: Set(0),
            cache_read_tokens: Set(0),
            cache_write_tokens: Set(0),
            cache_5m_write_tokens: Set(0),
            cache_1h_write_tokens: Set(0),
            cost: Set(0.0),
        };
        let inserted = active.insert(&self.db).await?;
        let parent = proxy_requests::Entity::find_by_id(attempt.proxy_request_id)
            .one(&self.db)
            .await?;
        if let Some(parent) = parent {
            let attempt_count = parent.attempt_count + 1;
            let mut active: proxy_requests::ActiveModel = parent.into();
            active.attempt_count = Set(attempt_count);
            active.update(&self.db).await?;
        }
        Ok(inserted.id)
    }

    async fn complete_upstream_attempt(
        &self,
        id: i64,
        status: &str,
        response_info_json: Option<serde_json::Value>,
        tokens: TokenMetrics,
        cost: f64,
    ) -> StorageResult<()> {
        let row = proxy_upstream_attempts::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| crate::storage::StorageError::NotFound(format!("upstream_attempt {id}")))?;
        let mut active: proxy_upstream_attempts::ActiveModel = row.into();
        active.status = Set(status.to_string());
        active.response_info_json = Set(response_info_json);
        active.input_tokens = Set(tokens.input);
        active.output_tokens = Set(tokens.output);
        active.cache_read_tokens = Set(tokens.cache_read);
        active.cache_write_tokens = Set(tokens.cache_write);
        active.cache_5m_write_tokens = Set(tokens.cache_5m_write);
        active.cache_1h_write_tokens = Set(tokens.cache_1h_write);
        active.cost = Set(cost);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn upsert_cooldown(
        &self,
        provider_id: i64,
        client_dialect: &str,
        reason: &str,
        until: OffsetDateTime,
        failure_count: i32,
    ) -> StorageResult<()> {
        let existing = cooldowns::Entity::find()
            .filter(cooldowns::Column::ProviderId.eq(provider_id))
            .filter(cooldowns::Column::ClientDialect.eq(client_dialect))
            .filter(cooldowns::Column::Reason.eq(reason))
            .one(&self.db)
            .await?;
        match existing {
            Some(row) => {
                let mut active: cooldowns::ActiveModel = row.into();
                active.until = Set(until);
                active.failure_count = Set(failure_count);
                active.update(&self.db).await?;
            }
            None => {
                let active = cooldowns::ActiveModel {
                    id: Default::default(),
                    provider_id: Set(provider_id),
                    client_dialect: Set(client_dialect.to_string()),
                    reason: Set(reason.to_string()),
                    until: Set(until),
                    failure_count: Set(failure_count),
                };
                active.insert(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn clear_cooldown(&self, provider_id: i64, client_dialect: &str) -> StorageResult<()> {
        cooldowns::Entity::delete_many()
            .filter(cooldowns::Column::ProviderId.eq(provider_id))
            .filter(cooldowns::Column::ClientDialect.eq(client_dialect))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn gc_expired_cooldowns(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = cooldowns::Entity::delete_many()
            .filter(cooldowns::Column::Until.lt(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn bump_failure_count(&self, provider_id: i64, client_dialect: &str) -> StorageResult<i32> {
        let existing = failure_counts::Entity::find()
            .filter(failure_counts::Column::ProviderId.eq(provider_id))
            .filter(failure_counts::Column::ClientDialect.eq(client_dialect))
            .one(&self.db)
            .await?;
        let count = match existing {
            Some(row) => {
                let new_count = row.count + 1;
                let mut active: failure_counts::ActiveModel = row.into();
                active.count = Set(new_count);
                active.update(&self.db).await?;
                new_count
            }
            None => {
                let active = failure_counts::ActiveModel {
                    id: Default::default(),
                    provider_id: Set(provider_id),
                    client_dialect: Set(client_dialect.to_string()),
                    count: Set(1),
                };
                active.insert(&self.db).await?;
                1
            }
        };
        Ok(count)
    }

    async fn clear_failure_count(&self, provider_id: i64, client_dialect: &str) -> StorageResult<()> {
        failure_counts::Entity::delete_many()
            .filter(failure_counts::Column::ProviderId.eq(provider_id))
            .filter(failure_counts::Column::ClientDialect.eq(client_dialect))
            .exec(&self.db)
            .await?;
        Ok(())
    }

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
    ) -> StorageResult<()> {
        use crate::entities::usage_stats;
        let existing = usage_stats::Entity::find()
            .filter(usage_stats::Column::Granularity.eq(granularity))
            .filter(usage_stats::Column::BucketStart.eq(bucket_start))
            .filter(usage_stats::Column::RouteId.eq(route_id))
            .filter(usage_stats::Column::ProviderId.eq(provider_id))
            .filter(usage_stats::Column::ProjectId.eq(project_id))
            .filter(usage_stats::Column::ApiTokenId.eq(api_token_id))
            .filter(usage_stats::Column::ClientDialect.eq(client_dialect))
            .filter(usage_stats::Column::Model.eq(model))
            .one(&self.db)
            .await?;
        match existing {
            Some(row) => {
                let mut active: usage_stats::ActiveModel = row.clone().into();
                active.request_count = Set(row.request_count + 1);
                active.input_tokens = Set(row.input_tokens + tokens.input);
                active.output_tokens = Set(row.output_tokens + tokens.output);
                active.cache_read_tokens = Set(row.cache_read_tokens + tokens.cache_read);
                active.cache_write_tokens = Set(row.cache_write_tokens + tokens.cache_write);
                active.cost = Set(row.cost + cost);
                active.update(&self.db).await?;
            }
            None => {
                let active = usage_stats::ActiveModel {
                    id: Default::default(),
                    granularity: Set(granularity.to_string()),
                    bucket_start: Set(bucket_start),
                    route_id: Set(route_id),
                    provider_id: Set(provider_id),
                    project_id: Set(project_id),
                    api_token_id: Set(api_token_id),
                    client_dialect: Set(client_dialect.to_string()),
                    model: Set(model.to_string()),
                    request_count: Set(1),
                    input_tokens: Set(tokens.input),
                    output_tokens: Set(tokens.output),
                    cache_read_tokens: Set(tokens.cache_read),
                    cache_write_tokens: Set(tokens.cache_write),
                    cost: Set(cost),
                };
                active.insert(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn rollup_usage_stats(
        &self,
        from_granularity: &str,
        to_granularity: &str,
        bucket_start: OffsetDateTime,
    ) -> StorageResult<()> {
        use crate::entities::usage_stats;
        let rows = usage_stats::Entity::find()
            .filter(usage_stats::Column::Granularity.eq(from_granularity))
            .filter(usage_stats::Column::BucketStart.eq(bucket_start))
            .all(&self.db)
            .await?;
        for row in rows {
            self.bump_usage_stats(
                to_granularity,
                bucket_start,
                row.route_id,
                row.provider_id,
                row.project_id,
                row.api_token_id,
                &row.client_dialect,
                &row.model,
                TokenMetrics {
                    input: row.input_tokens,
                    output: row.output_tokens,
                    cache_read: row.cache_read_tokens,
                    cache_write: row.cache_write_tokens,
                    cache_5m_write: 0,
                    cache_1h_write: 0,
                },
                row.cost,
            )
            .await?;
        }
        Ok(())
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
