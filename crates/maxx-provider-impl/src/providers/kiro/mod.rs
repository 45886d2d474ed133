//! `kiro` provider adapter (§3 Provider.config.kiro, §4.4 Kiro/CodeWhisperer
//! AWS-EventStream → Claude SSE): the upstream speaks a binary
//! length-prefixed event stream, never JSON-over-SSE, so this adapter is
//! the only one that owns a byte-level framer (`EventStreamReader`) rather
//! than `maxx-protocol::sse::SseParser`. Client dialect is always `claude`
//! (§9 open question: no named conversion exists from CodeWhisperer's
//! native shape to OpenAI/Gemini, so routes pairing a Kiro provider with
//! another client dialect simply don't resolve as candidates).

mod oauth;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use maxx_protocol::aws_eventstream::EventStreamReader;
use maxx_protocol::claude::request::CreateMessageRequest;
use maxx_protocol::sse::encode_event;
use maxx_provider_core::config::{KiroConfig, ProviderConfig};
use maxx_provider_core::cooldown::CooldownReason;
use maxx_provider_core::errors::{ProxyError, classify_upstream_failure};
use maxx_provider_core::events::{AdapterEvent, RequestInfo, ResponseInfo};
use maxx_provider_core::headers::Headers;
use maxx_provider_core::provider::{ClientWriter, ExecutionContext, ProviderAdapter, UpstreamInvocation};
use maxx_transform::kiro_claude::stream::KiroToClaudeStreamState;

use crate::http::shared_client;

const PROVIDER_NAME: &str = "kiro";
const SUPPORTED_DIALECTS: &[&str] = &["claude"];

#[derive(Debug, Default)]
pub struct KiroAdapter;

impl KiroAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderAdapter for KiroAdapter {
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
            ProviderConfig::Kiro(cfg) => cfg,
            _ => {
                return Err(ProxyError::new(
                    "kiro adapter given non-kiro config",
                    false,
                    CooldownReason::Unknown,
                ));
            }
        };

        let incoming: CreateMessageRequest = serde_json::from_slice(&request.body)
            .map_err(|err| ProxyError::new(format!("malformed claude request body: {err}"), false, CooldownReason::Unknown))?;

        let access_token = oauth::ensure_access_token(cfg).await?;
        let payload = oauth::build_conversation_request(&incoming, &ctx.mapped_model);
        let body = serde_json::to_vec(&payload)
            .map_err(|err| ProxyError::new(format!("failed to encode kiro request: {err}"), false, CooldownReason::Unknown))?;

        let url = oauth::generate_assistant_response_url(&cfg.region);
        let mut headers: Headers = Vec::new();
        headers.push(("content-type".to_string(), "application/json".to_string()));
        headers.push(("authorization".to_string(), format!("Bearer {access_token}")));

        let _ = events
            .send(AdapterEvent::RequestInfo(RequestInfo {
                method: "POST".to_string(),
                url: url.clone(),
                headers: headers.clone(),
                body: None,
            }))
            .await;

        let client = shared_client();
        let resp = client
            .post(&url)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {access_token}"))
            .body(Bytes::from(body))
            .send()
            .await
            .map_err(|err| ProxyError::new(format!("kiro request failed: {err}"), true, CooldownReason::NetworkError))?;

        let status = resp.status().as_u16();
        let resp_headers: Headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();

        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            let reason = classify_upstream_failure(status, &body_text);
            return Err(ProxyError::new(
                format!("kiro upstream returned {status}: {}", truncate(&body_text, 2048)),
                true,
                reason,
            ));
        }

        let _ = events
            .send(AdapterEvent::ResponseInfo(ResponseInfo {
                status,
                headers: resp_headers,
                body: None,
            }))
            .await;

        let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());
        let mut state = KiroToClaudeStreamState::new(message_id, ctx.mapped_model.clone());
        let mut reader = EventStreamReader::new();
        let mut committed = false;
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| {
                ProxyError::new(format!("kiro stream read failed: {err}"), !committed, CooldownReason::NetworkError)
            })?;
            reader.push(&chunk);

            let frames = reader.drain().map_err(|_| {
                ProxyError::new("kiro event stream framing failed repeatedly", !committed, CooldownReason::Unknown)
            })?;

            for frame in frames {
                let stream_events = state.transform_frame(frame);
                if !send_events(&writer, &stream_events).await {
                    return Ok(());
                }
                if !stream_events.is_empty() {
                    committed = true;
                }
                if state.is_terminated() {
                    return Ok(());
                }
            }
        }

        if !state.is_terminated() {
            let closing = state.finish(None);
            if !send_events(&writer, &closing).await {
                return Ok(());
            }
        }

        Ok(())
    }
}

async fn send_events(writer: &ClientWriter, stream_events: &[maxx_protocol::claude::stream::StreamEvent]) -> bool {
    for event in stream_events {
        let data = match serde_json::to_string(event) {
            Ok(data) => data,
            Err(_) => continue,
        };
        let frame = encode_event(event.event_name(), &data);
        if writer.send(Bytes::from(frame)).await.is_err() {
            return false;
        }
    }
    true
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max { s } else { &s[..max] }
}
