use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::ProviderConfig;
use crate::errors::{ProviderResult, ProxyError};
use crate::events::AdapterEvent;
use crate::headers::Headers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub is_stream: bool,
}

/// The client-facing byte sink a provider adapter streams converted chunks
/// into; the first successful `send` is the commit point the Executor's
/// retry decision depends on (§4.4 rule 4, §4.6).
pub type ClientWriter = mpsc::Sender<Bytes>;

/// One invocation of a candidate route (§4.5 state machine:
/// `Idle → Build → Send → Headers → Stream/Buffer → Commit → Done`).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub request_id: String,
    pub session_id: String,
    pub client_dialect: String,
    pub route_id: i64,
    pub provider_id: i64,
    pub attempt_no: u32,
    pub deadline: tokio::time::Instant,
    pub requested_model: String,
    pub mapped_model: String,
    pub client_user_agent: Option<String>,
    pub passthrough_headers: Headers,
}

/// The inbound request body, already in the client's wire dialect; the
/// adapter runs the Dialect Converter itself when its native dialect
/// differs (§4.5 point 1).
#[derive(Debug, Clone)]
pub struct UpstreamInvocation {
    pub body: Bytes,
    pub stream: bool,
}

/// `ProviderAdapter` contract (§4.5): `supportedDialects()` plus `execute`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> &'static str;
    fn supported_dialects(&self) -> &'static [&'static str];

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &ProviderConfig,
        writer: ClientWriter,
        request: UpstreamInvocation,
        events: mpsc::Sender<AdapterEvent>,
    ) -> Result<(), ProxyError>;
}

pub fn retry_after_from_header(headers: &Headers) -> Option<Duration> {
    let value = crate::headers::header_get(headers, "retry-after")?;
    let secs: u64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(secs))
}

pub type SharedProviderAdapter = Arc<dyn ProviderAdapter>;

pub fn config_from_json(kind: &str, json: &serde_json::Value) -> ProviderResult<ProviderConfig> {
    serde_json::from_value::<ProviderConfig>(json.clone()).map_err(|err| {
        crate::errors::ProviderError::InvalidConfig(format!("{kind}: {err}"))
    })
}
