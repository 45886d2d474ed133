//! §7 Error Handling: the taxonomy the HTTP layer maps onto a status code
//! and a client-dialect-appropriate body.

use bytes::Bytes;
use http::StatusCode;

use crate::client_adapter::ClientAdapterError;
use crate::executor::ExecutorError;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Malformed request body or missing required field (§7
    /// ValidationError) — 400, never retried.
    #[error("validation error: {0}")]
    Validation(String),
    /// The Router produced an empty candidate list (§7 NoRoutesError) —
    /// 503, nothing was attempted upstream.
    #[error("no routes matched")]
    NoRoutes,
    /// Every candidate failed retryably and none remained (§7
    /// UpstreamRetryable escalates here) — 502.
    #[error("upstream exhausted: {0}")]
    UpstreamExhausted(String),
    /// A candidate failed after committing bytes to the client (§7
    /// UpstreamNonRetryable): the response is already partially sent, so
    /// this only matters for logging/the final event, not the status line.
    #[error("upstream failed after response began: {0}")]
    UpstreamNonRetryable(String),
    /// One silent credential refresh already failed (§7 AuthError) — 401.
    #[error("upstream authentication failed: {0}")]
    Auth(String),
    /// `GracefulShutdown` has begun; new requests are rejected (§7
    /// ShutdownInProgress) — 503.
    #[error("shutdown in progress")]
    ShuttingDown,
    /// Client-facing API key missing/invalid — 401/403.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Validation(_) => StatusCode::BAD_REQUEST,
            RequestError::NoRoutes => StatusCode::SERVICE_UNAVAILABLE,
            RequestError::UpstreamExhausted(_) => StatusCode::BAD_GATEWAY,
            RequestError::UpstreamNonRetryable(_) => StatusCode::BAD_GATEWAY,
            RequestError::Auth(_) => StatusCode::UNAUTHORIZED,
            RequestError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            RequestError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn body(&self) -> Bytes {
        Bytes::from(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<ExecutorError> for RequestError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::ShuttingDown => RequestError::ShuttingDown,
            ExecutorError::NoRoutes => RequestError::NoRoutes,
            ExecutorError::UpstreamExhausted(msg) => RequestError::UpstreamExhausted(msg),
            ExecutorError::Storage(err) => RequestError::UpstreamExhausted(err.to_string()),
        }
    }
}

impl From<ClientAdapterError> for RequestError {
    fn from(err: ClientAdapterError) -> Self {
        RequestError::Validation(err.to_string())
    }
}
