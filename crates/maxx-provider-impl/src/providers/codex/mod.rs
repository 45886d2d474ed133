//! `codex` provider adapter (§3 Provider.config.codex, §4.4 Codex headers):
//! the upstream Responses API is also the only dialect this provider
//! speaks, so there is no Dialect Converter step here — the client body is
//! forwarded byte-for-byte, same as `custom`'s `"codex"` branch, with the
//! passthrough client headers copied across a hop-by-hop/proxy/tracing/CDN
//! denylist and OAuth bearer auth layered on top.

mod oauth;

use async_trait::async_trait;
use tokio::sync::mpsc;

use maxx_provider_core::config::{CodexConfig, ProviderConfig};
use maxx_provider_core::cooldown::CooldownReason;
use maxx_provider_core::errors::ProxyError;
use maxx_provider_core::events::{AdapterEvent, RequestInfo, ResponseInfo};
use maxx_provider_core::headers::Headers;
use maxx_provider_core::provider::{ClientWriter, ExecutionContext, ProviderAdapter, UpstreamInvocation};

use crate::http::send_and_stream;

const PROVIDER_NAME: &str = "codex";
const SUPPORTED_DIALECTS: &[&str] = &["codex"];

/// Headers never copied from the client request: hop-by-hop framing
/// headers plus proxy/tracing/CDN metadata that must not leak to the
/// upstream (or that the adapter sets itself, like `authorization`).
const HEADER_DENYLIST: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "authorization",
    "cookie",
    "x-forwarded-for",
    "x-forwarded-proto",
    "x-forwarded-host",
    "x-real-ip",
    "cf-connecting-ip",
    "cf-ray",
    "cf-ipcountry",
    "cf-visitor",
    "x-amzn-trace-id",
    "x-request-id",
    "x-b3-traceid",
    "x-b3-spanid",
    "traceparent",
    "tracestate",
];

#[derive(Debug, Default)]
pub struct CodexAdapter;

impl CodexAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderAdapter for CodexAdapter {
    fn kind(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn supported_dialects(&self) -> &'static [&'static str] {
        SUPPORTED_DIALECTS
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        config: &ProviderConfig,
        writer: ClientWriter,
        request: UpstreamInvocation,
        events: mpsc::Sender<AdapterEvent>,
    ) -> Result<(), ProxyError> {
        let cfg = match config {
            ProviderConfig::Codex(cfg) => cfg,
            _ => {
                return Err(ProxyError::new(
                    "codex adapter given non-codex config",
                    false,
                    CooldownReason::Unknown,
                ));
            }
        };

        let access_token = ensure_access_token(cfg).await?;
        let url = format!("{}/responses", oauth::DEFAULT_BASE_URL);

        let mut headers: Headers = ctx
            .passthrough_headers
            .iter()
            .filter(|(name, _)| !HEADER_DENYLIST.contains(&name.to_ascii_lowercase().as_str()))
            .cloned()
            .collect();
        headers.push(("content-type".to_string(), "application/json".to_string()));
        headers.push(("authorization".to_string(), format!("Bearer {access_token}")));
        headers.push(("openai-beta".to_string(), "responses=experimental".to_string()));
        headers.push(("version".to_string(), oauth::CLIENT_VERSION.to_string()));
        if let Some(account_id) = &cfg.account_id {
            headers.push(("chatgpt-account-id".to_string(), account_id.clone()));
        }

        let _ = events
            .send(AdapterEvent::RequestInfo(RequestInfo {
                method: "POST".to_string(),
                url: url.clone(),
                headers: headers.clone(),
                body: None,
            }))
            .await;

        let meta = send_and_stream("POST", &url, &headers, request.body, &writer).await?;

        let _ = events
            .send(AdapterEvent::ResponseInfo(ResponseInfo {
                status: meta.status,
                headers: meta.headers,
                body: None,
            }))
            .await;

        Ok(())
    }
}

async fn ensure_access_token(cfg: &CodexConfig) -> Result<String, ProxyError> {
    let still_valid = cfg
        .access_token
        .as_ref()
        .filter(|token| !token.is_empty())
        .is_some()
        && cfg
            .expires_at
            .map(|expires_at| expires_at > time::OffsetDateTime::now_utc())
            .unwrap_or(true);

    if still_valid {
        return Ok(cfg.access_token.clone().unwrap());
    }

    let token = oauth::refresh_access_token(&cfg.refresh_token).await?;
    Ok(token.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylist_is_lowercase() {
        for header in HEADER_DENYLIST {
            assert_eq!(*header, header.to_ascii_lowercase());
        }
    }
}
