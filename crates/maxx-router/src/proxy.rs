//! §6 External Interfaces / §4.1 Client Adapter entry point: the single
//! handler every dialect's request path funnels through. Routing by path
//! alone (rather than one `axum` route per dialect) keeps the optional
//! `/project/{slug}` prefix and Gemini's `:operation`-suffixed model
//! segment from fighting axum's own path-param syntax.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures_util::StreamExt;
use maxx_core::client_adapter::{self, ClientAdapterError};
use maxx_core::executor::{self, ExecuteParams, ExecutorError};
use maxx_core::state::AppState;
use maxx_provider_core::provider::ClientWriter;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Outbound channel capacity between a provider adapter and the client
/// socket; large enough to smooth bursty SSE chunking without unbounded
/// buffering.
const WRITER_CHANNEL_CAPACITY: usize = 64;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(proxy_handler)
        .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    let (project_slug, dialect_path) = client_adapter::split_project_prefix(uri.path());
    let Some(dialect) = client_adapter::match_dialect(dialect_path) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    if let Err(err) = state.auth.authenticate(&headers) {
        let mut response = (err.status, err.body).into_response();
        *response.headers_mut() = err.headers;
        return response;
    }

    let body_json: serde_json::Value = if body.is_empty() {
        serde_json::Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(err) => return error_json(StatusCode::BAD_REQUEST, format!("malformed request body: {err}")),
        }
    };

    let request_id = uuid::Uuid::now_v7().to_string();
    let extracted = match client_adapter::extract_info(dialect, dialect_path, &headers, &body_json, &request_id) {
        Ok(info) => info,
        Err(ClientAdapterError::UnknownPath(path)) => {
            return error_json(StatusCode::NOT_FOUND, format!("unrecognised path: {path}"));
        }
        Err(ClientAdapterError::MissingField(field)) => {
            return error_json(StatusCode::BAD_REQUEST, format!("missing required field: {field}"));
        }
    };

    let snapshot = state.snapshot.load_full();
    let project_id = project_slug
        .and_then(|slug| snapshot.projects.iter().find(|p| p.slug == slug))
        .map(|p| p.id)
        .unwrap_or(0);

    let passthrough_headers: Vec<(String, String)> = headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect();

    let client_user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let params = ExecuteParams {
        request_id,
        session_id: extracted.session_id,
        client_dialect: dialect,
        project_id,
        requested_model: extracted.requested_model,
        client_user_agent,
        passthrough_headers,
        body,
        stream: extracted.stream,
    };
    let stream_response = params.stream;

    let (tx, mut rx): (ClientWriter, mpsc::Receiver<Bytes>) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
    let exec_state = state.clone();
    let task = tokio::spawn(async move { executor::execute(&exec_state, params, tx).await });

    match rx.recv().await {
        Some(first_chunk) => {
            let rest = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
            let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(first_chunk) }).chain(rest);
            let content_type = if stream_response { "text/event-stream" } else { "application/json" };
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", content_type)
                .body(Body::from_stream(stream))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        None => match task.await {
            Ok(Ok(())) => StatusCode::NO_CONTENT.into_response(),
            Ok(Err(err)) => executor_error_response(err),
            Err(join_err) => error_json(StatusCode::INTERNAL_SERVER_ERROR, format!("executor task panicked: {join_err}")),
        },
    }
}

fn executor_error_response(err: ExecutorError) -> Response {
    let status = match err {
        ExecutorError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        ExecutorError::NoRoutes => StatusCode::SERVICE_UNAVAILABLE,
        ExecutorError::UpstreamExhausted(_) => StatusCode::BAD_GATEWAY,
        ExecutorError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_json(status, err.to_string())
}

fn error_json(status: StatusCode, message: String) -> Response {
    (
        status,
        axum::Json(serde_json::json!({ "error": { "message": message } })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        assert_eq!(health().await.0, serde_json::json!({ "status": "ok" }));
    }
}
