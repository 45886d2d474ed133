use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::cooldown::CooldownReason;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Adapter construction/config errors — distinct from `ProxyError`, which is
/// what `ProviderAdapter::execute` returns for a failed attempt (§4.5).
#[derive(Debug, Clone)]
pub enum ProviderError {
    Unsupported(&'static str),
    InvalidConfig(String),
    MissingCredentialField(&'static str),
    Other(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Unsupported(what) => write!(f, "unsupported: {what}"),
            ProviderError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            ProviderError::MissingCredentialField(field) => {
                write!(f, "missing credential field: {field}")
            }
            ProviderError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for ProviderError {}

/// Returned by `ProviderAdapter::execute` on a failed attempt (§4.5, §7).
///
/// `retryable` must be `true` iff no byte has yet crossed the client writer
/// boundary — the Executor (§4.6) uses exactly this flag to decide whether
/// advancing to the next candidate/retry is safe.
#[derive(Debug, Clone)]
pub struct ProxyError {
    pub message: String,
    pub retryable: bool,
    pub reason: CooldownReason,
    pub retry_after: Option<Duration>,
}

impl ProxyError {
    pub fn new(message: impl Into<String>, retryable: bool, reason: CooldownReason) -> Self {
        Self {
            message: message.into(),
            retryable,
            reason,
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (reason={:?}, retryable={})", self.message, self.reason, self.retryable)
    }
}

impl Error for ProxyError {}

/// Classify an HTTP status alone into a `CooldownReason` (§4.5 point 6).
/// Covers the unambiguous cases; a plain 403 is ambiguous between an auth
/// failure and quota exhaustion, so it falls through to `Unknown` here —
/// callers with the response body in hand should use
/// [`classify_upstream_failure`] instead.
pub fn classify_http_status(status: u16) -> CooldownReason {
    match status {
        429 => CooldownReason::RateLimitExceeded,
        500..=599 => CooldownReason::ServerError,
        _ => CooldownReason::Unknown,
    }
}

/// Classify an HTTP status plus response body (§4.5 point 6: "403 with quota
/// semantic → quota_exhausted"). Providers return a bare 403 for both auth
/// failure and quota exhaustion; the body's error code/message is the only
/// signal that distinguishes them.
pub fn classify_upstream_failure(status: u16, body: &str) -> CooldownReason {
    if status == 403 && has_quota_semantic(body) {
        return CooldownReason::QuotaExhausted;
    }
    classify_http_status(status)
}

fn has_quota_semantic(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    body.contains("quota") || body.contains("resource_exhausted") || body.contains("insufficient_quota")
}
