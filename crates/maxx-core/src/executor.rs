//! §4.6 Executor: drive the Router's candidate list to exactly one outcome
//! and persist the full attempt trail.
//!
//! The Executor is the sole writer of the client body once the first byte
//! crosses the `ClientWriter` boundary (§4.4 rule 4): `ProviderAdapter::
//! execute` reports `retryable = true` iff that boundary was never crossed,
//! so this loop never needs to track commit state itself, only trust the
//! flag it gets back.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use maxx_common::ClientDialect;
use maxx_provider_core::config::ProviderConfig;
use maxx_provider_core::config_from_json;
use maxx_provider_core::cooldown::CooldownReason;
use maxx_provider_core::errors::ProxyError;
use maxx_provider_core::events::{
    AdapterEvent, Event, ProxyRequestUpdateEvent, ProxyUpstreamAttemptUpdateEvent,
};
use maxx_provider_core::provider::{ClientWriter, ExecutionContext, UpstreamInvocation};
use maxx_storage::snapshot::RetryConfigRow;
use maxx_storage::{NewProxyRequest, NewUpstreamAttempt, Storage, StorageError, TokenMetrics};
use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::model_mapping::{self, MappingScope};
use crate::request_tracker::Admission;
use crate::router::{self, Candidate};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("shutdown in progress")]
    ShuttingDown,
    #[error("no routes matched")]
    NoRoutes,
    #[error("upstream exhausted: {0}")]
    UpstreamExhausted(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct ExecuteParams {
    pub request_id: String,
    pub session_id: String,
    pub client_dialect: ClientDialect,
    pub project_id: i64,
    pub requested_model: String,
    pub client_user_agent: Option<String>,
    pub passthrough_headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stream: bool,
}

/// Drives one client request end to end. Response bytes, already converted
/// into the client's own dialect by the winning adapter, are forwarded to
/// `writer` as they arrive.
pub async fn execute(
    app: &Arc<AppState>,
    params: ExecuteParams,
    writer: ClientWriter,
) -> Result<(), ExecutorError> {
    let _admission = Admission::new(&app.tracker).ok_or(ExecutorError::ShuttingDown)?;

    let proxy_request_id = app
        .storage
        .create_proxy_request(NewProxyRequest {
            request_id: params.request_id.clone(),
            session_id: params.session_id.clone(),
            client_dialect: params.client_dialect.as_str().to_string(),
            instance_id: app.instance_id.clone(),
            request_info_json: None,
        })
        .await?;
    emit_request_update(app, proxy_request_id, "PENDING").await;

    let snapshot = app.snapshot.load_full();
    let candidates = router::resolve(
        &snapshot,
        &app.registry,
        &app.cooldowns,
        params.client_dialect,
        params.project_id,
        &params.requested_model,
    )
    .await;

    let candidates = match candidates {
        Ok(candidates) => candidates,
        Err(_) => {
            app.storage
                .complete_proxy_request(
                    proxy_request_id,
                    "FAILED",
                    None,
                    Some("no routes matched".to_string()),
                    None,
                    TokenMetrics::default(),
                    0.0,
                )
                .await?;
            emit_request_update(app, proxy_request_id, "FAILED").await;
            return Err(ExecutorError::NoRoutes);
        }
    };

    app.storage.mark_proxy_request_in_progress(proxy_request_id).await?;
    emit_request_update(app, proxy_request_id, "IN_PROGRESS").await;

    let mut success = false;
    let mut final_attempt_id: Option<i64> = None;
    let mut last_error: Option<ProxyError> = None;
    let mut total_tokens = TokenMetrics::default();

    'candidates: for candidate in &candidates {
        let Some(provider_row) = snapshot.providers.iter().find(|p| p.id == candidate.provider_id) else {
            continue;
        };
        let provider_config = match config_from_json(&provider_row.kind, &provider_row.config_json) {
            Ok(config) => config,
            Err(err) => {
                last_error = Some(ProxyError::new(err.to_string(), true, CooldownReason::Unknown));
                continue;
            }
        };

        let mapped_model = model_mapping::resolve(
            &snapshot.model_mappings,
            &MappingScope {
                client_dialect: params.client_dialect.as_str(),
                provider_kind: &candidate.provider_kind,
                provider_id: candidate.provider_id,
                project_id: params.project_id,
                route_id: candidate.route_id,
            },
            &params.requested_model,
        );

        let attempt_id = app
            .storage
            .create_upstream_attempt(NewUpstreamAttempt {
                proxy_request_id,
                route_id: candidate.route_id,
                provider_id: candidate.provider_id,
            })
            .await?;
        emit_attempt_update(app, proxy_request_id, attempt_id, "PENDING").await;

        let mut retries: u32 = 0;
        loop {
            let (outcome, attempt_tokens) = run_attempt(
                candidate,
                &provider_config,
                &params,
                &mapped_model,
                retries,
                writer.clone(),
            )
            .await;

            total_tokens = add_tokens(total_tokens, &attempt_tokens);

            match outcome {
                Ok(()) => {
                    app.storage
                        .complete_upstream_attempt(attempt_id, "COMPLETED", None, attempt_tokens, 0.0)
                        .await?;
                    emit_attempt_update(app, proxy_request_id, attempt_id, "COMPLETED").await;
                    app.cooldowns
                        .record_success(candidate.provider_id, params.client_dialect.as_str())
                        .await;
                    final_attempt_id = Some(attempt_id);
                    success = true;
                    break 'candidates;
                }
                Err(err) => {
                    app.storage
                        .complete_upstream_attempt(attempt_id, "FAILED", None, attempt_tokens, 0.0)
                        .await?;
                    emit_attempt_update(app, proxy_request_id, attempt_id, "FAILED").await;
                    app.cooldowns
                        .record(candidate.provider_id, params.client_dialect.as_str(), err.reason, err.retry_after)
                        .await;

                    let retryable = err.retryable;
                    let retry_after = err.retry_after;
                    last_error = Some(err);

                    if !retryable {
                        // Bytes already crossed the client boundary; no
                        // other candidate can safely take over this stream.
                        break 'candidates;
                    }

                    if retries < candidate.retry_config.max_retries as u32 {
                        tokio::time::sleep(backoff_for(&candidate.retry_config, retries, retry_after)).await;
                        retries += 1;
                        continue;
                    }
                    continue 'candidates;
                }
            }
        }
    }

    let (status, error_message) = if success {
        ("COMPLETED", None)
    } else {
        (
            "FAILED",
            Some(last_error.as_ref().map(|e| e.message.clone()).unwrap_or_else(|| "no candidate succeeded".to_string())),
        )
    };

    app.storage
        .complete_proxy_request(
            proxy_request_id,
            status,
            None,
            error_message.clone(),
            final_attempt_id,
            total_tokens,
            0.0,
        )
        .await?;
    emit_request_update(app, proxy_request_id, status).await;

    if success {
        Ok(())
    } else if let Some(err) = last_error {
        Err(ExecutorError::UpstreamExhausted(err.message))
    } else {
        Err(ExecutorError::UpstreamExhausted("no candidate succeeded".to_string()))
    }
}

async fn run_attempt(
    candidate: &Candidate,
    provider_config: &ProviderConfig,
    params: &ExecuteParams,
    mapped_model: &str,
    attempt_no: u32,
    writer: ClientWriter,
) -> (Result<(), ProxyError>, TokenMetrics) {
    let ctx = ExecutionContext {
        request_id: params.request_id.clone(),
        session_id: params.session_id.clone(),
        client_dialect: params.client_dialect.as_str().to_string(),
        route_id: candidate.route_id,
        provider_id: candidate.provider_id,
        attempt_no: attempt_no + 1,
        deadline: tokio::time::Instant::now() + Duration::from_secs(900),
        requested_model: params.requested_model.clone(),
        mapped_model: mapped_model.to_string(),
        client_user_agent: params.client_user_agent.clone(),
        passthrough_headers: params.passthrough_headers.clone(),
    };

    let (event_tx, event_rx) = mpsc::channel::<AdapterEvent>(64);
    let metrics_task = tokio::spawn(collect_metrics(event_rx));

    let invocation = UpstreamInvocation {
        body: params.body.clone(),
        stream: params.stream,
    };

    let result = candidate
        .adapter
        .execute(&ctx, provider_config, writer, invocation, event_tx)
        .await;

    let tokens = metrics_task.await.unwrap_or_default();
    (result, tokens)
}

async fn collect_metrics(mut rx: mpsc::Receiver<AdapterEvent>) -> TokenMetrics {
    let mut tokens = TokenMetrics::default();
    while let Some(event) = rx.recv().await {
        if let AdapterEvent::Metrics(m) = event {
            tokens.input += m.input;
            tokens.output += m.output;
            tokens.cache_read += m.cache_read;
            tokens.cache_write += m.cache_creation;
            tokens.cache_5m_write += m.cache_5m;
            tokens.cache_1h_write += m.cache_1h;
        }
    }
    tokens
}

fn add_tokens(mut total: TokenMetrics, attempt: &TokenMetrics) -> TokenMetrics {
    total.input += attempt.input;
    total.output += attempt.output;
    total.cache_read += attempt.cache_read;
    total.cache_write += attempt.cache_write;
    total.cache_5m_write += attempt.cache_5m_write;
    total.cache_1h_write += attempt.cache_1h_write;
    total
}

/// `min(initialInterval * backoffRate^retries, maxInterval)`, raised to
/// `retryAfter` when the upstream's own hint is larger (§4.6 backoff).
fn backoff_for(retry: &RetryConfigRow, retries: u32, retry_after: Option<Duration>) -> Duration {
    let computed_ms = (retry.initial_interval_ms as f64 * retry.backoff_rate.powi(retries as i32))
        .min(retry.max_interval_ms as f64)
        .max(0.0);
    let computed = Duration::from_millis(computed_ms as u64);
    match retry_after {
        Some(ra) if ra > computed => ra,
        _ => computed,
    }
}

async fn emit_request_update(app: &Arc<AppState>, proxy_request_id: i64, status: &str) {
    app.events
        .emit(Event::ProxyRequestUpdate(ProxyRequestUpdateEvent {
            proxy_request_id,
            status: status.to_string(),
            at: OffsetDateTime::now_utc(),
        }))
        .await;
}

async fn emit_attempt_update(app: &Arc<AppState>, proxy_request_id: i64, attempt_id: i64, status: &str) {
    app.events
        .emit(Event::ProxyUpstreamAttemptUpdate(ProxyUpstreamAttemptUpdateEvent {
            proxy_upstream_attempt_id: attempt_id,
            proxy_request_id,
            status: status.to_string(),
            at: OffsetDateTime::now_utc(),
        }))
        .await;
}
