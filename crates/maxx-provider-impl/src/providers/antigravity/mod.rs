//! `antigravity` provider adapter (§3 Provider.config.antigravity): Google's
//! internal Code Assist `/v1internal` surface, wrapped as
//! `{model, project, request}` around a standard Gemini `generateContent`
//! body. Native dialect is `gemini`; `claude` clients get the request
//! shaped through `claude_gemini::request` and the response/stream folded
//! back through `gemini_claude` (§4.4). OpenAI/Codex clients have no named
//! conversion path directly onto a Gemini-native backend (bridging them
//! would require a Gemini→Claude→OpenAI double hop, which nothing in the
//! dialect converter does in one step) so `supported_dialects` excludes
//! `openai`/`codex`; see the `custom` adapter for the Claude↔OpenAI pair.

mod oauth;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use maxx_protocol::claude::request::CreateMessageRequest;
use maxx_protocol::gemini::response::GenerateContentResponse;
use maxx_protocol::sse::encode_event;
use maxx_provider_core::config::{AntigravityConfig, ProviderConfig};
use maxx_provider_core::cooldown::CooldownReason;
use maxx_provider_core::errors::{ProxyError, classify_upstream_failure};
use maxx_provider_core::events::{AdapterEvent, RequestInfo, ResponseInfo};
use maxx_provider_core::headers::Headers;
use maxx_provider_core::provider::{ClientWriter, ExecutionContext, ProviderAdapter, UpstreamInvocation};
use maxx_transform::claude_gemini::request::claude_to_gemini_request;
use maxx_transform::gemini_claude::response::gemini_to_claude_response;
use maxx_transform::gemini_claude::stream::{GeminiToClaudeStreamState, unwrap_envelope_line};

use crate::http::shared_client;

const PROVIDER_NAME: &str = "antigravity";
const SUPPORTED_DIALECTS: &[&str] = &["claude", "gemini"];

#[derive(Debug, Default)]
pub struct AntigravityAdapter;

impl AntigravityAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderAdapter for AntigravityAdapter {
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
            ProviderConfig::Antigravity(cfg) => cfg,
            _ => {
                return Err(ProxyError::new(
                    "antigravity adapter given non-antigravity config",
                    false,
                    CooldownReason::Unknown,
                ));
            }
        };

        let base_url = oauth::DEFAULT_BASE_URL;
        let access_token = ensure_access_token(cfg).await?;
        let project_id = ensure_project_id(cfg, &access_token, base_url).await?;
        let model = oauth::normalize_model_name(&ctx.mapped_model);

        let gemini_body = match ctx.client_dialect.as_str() {
            "claude" => {
                let claude_req: CreateMessageRequest = serde_json::from_slice(&request.body)
                    .map_err(|err| ProxyError::new(format!("malformed claude request body: {err}"), false, CooldownReason::Unknown))?;
                serde_json::to_value(claude_to_gemini_request(&claude_req))
                    .map_err(|err| ProxyError::new(format!("failed to encode gemini request: {err}"), false, CooldownReason::Unknown))?
            }
            "gemini" => serde_json::from_slice(&request.body)
                .map_err(|err| ProxyError::new(format!("malformed gemini request body: {err}"), false, CooldownReason::Unknown))?,
            other => {
                return Err(ProxyError::new(
                    format!("antigravity adapter does not support client dialect {other}"),
                    false,
                    CooldownReason::Unknown,
                ));
            }
        };

        let wrapped = serde_json::json!({
            "model": &model,
            "project": &project_id,
            "request": gemini_body,
        });
        let body = serde_json::to_vec(&wrapped)
            .map_err(|err| ProxyError::new(format!("failed to encode v1internal request: {err}"), false, CooldownReason::Unknown))?;

        let path = if request.stream {
            "/v1internal:streamGenerateContent?alt=sse"
        } else {
            "/v1internal:generateContent"
        };
        let url = format!("{base_url}{path}");

        let mut headers: Headers = Vec::new();
        headers.push(("authorization".to_string(), format!("Bearer {access_token}")));
        headers.push(("content-type".to_string(), "application/json".to_string()));
        headers.push(("accept".to_string(), "application/json".to_string()));
        headers.push(("user-agent".to_string(), oauth::ANTIGRAVITY_USER_AGENT.to_string()));
        headers.push(("accept-encoding".to_string(), "gzip".to_string()));
        headers.push(("requestid".to_string(), oauth::make_request_id()));
        headers.push((
            "requesttype".to_string(),
            if model.to_ascii_lowercase().contains("image") { "image_gen" } else { "agent" }.to_string(),
        ));

        let _ = events
            .send(AdapterEvent::RequestInfo(RequestInfo {
                method: "POST".to_string(),
                url: url.clone(),
                headers: headers.clone(),
                body: None,
            }))
            .await;

        let client = shared_client();
        let mut builder = client.post(&url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let resp = builder
            .body(Bytes::from(body))
            .send()
            .await
            .map_err(|err| ProxyError::new(format!("antigravity request failed: {err}"), true, CooldownReason::NetworkError))?;

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
                format!("antigravity upstream returned {status}: {}", truncate(&body_text, 2048)),
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

        if !request.stream {
            let bytes = resp
                .bytes()
                .await
                .map_err(|err| ProxyError::new(format!("antigravity response read failed: {err}"), true, CooldownReason::NetworkError))?;
            return self.forward_non_stream(ctx, &writer, &bytes).await;
        }

        self.forward_stream(ctx, &writer, resp).await
    }
}

impl AntigravityAdapter {
    async fn forward_non_stream(&self, ctx: &ExecutionContext, writer: &ClientWriter, bytes: &[u8]) -> Result<(), ProxyError> {
        let text = String::from_utf8_lossy(bytes);
        let inner = unwrap_envelope_line(&text)
            .ok_or_else(|| ProxyError::new("antigravity response malformed", false, CooldownReason::Unknown))?;

        let out = match ctx.client_dialect.as_str() {
            "gemini" => serde_json::to_vec(&inner),
            "claude" => {
                let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());
                let claude_resp = gemini_to_claude_response(&inner, &message_id);
                serde_json::to_vec(&claude_resp)
            }
            _ => unreachable!("supported_dialects already validated"),
        }
        .map_err(|err| ProxyError::new(format!("failed to re-encode response: {err}"), false, CooldownReason::Unknown))?;

        let _ = writer.send(Bytes::from(out)).await;
        Ok(())
    }

    async fn forward_stream(&self, ctx: &ExecutionContext, writer: &ClientWriter, resp: wreq::Response) -> Result<(), ProxyError> {
        let mut line_buf = BytesMut::new();
        let mut stream = resp.bytes_stream();
        let mut committed = false;

        let mut claude_state = if ctx.client_dialect.as_str() == "claude" {
            Some(GeminiToClaudeStreamState::new(format!("msg_{}", uuid::Uuid::new_v4().simple())))
        } else {
            None
        };

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| {
                ProxyError::new(format!("antigravity stream read failed: {err}"), !committed, CooldownReason::NetworkError)
            })?;
            line_buf.extend_from_slice(&chunk);

            while let Some(pos) = line_buf.iter().position(|b| *b == b'\n') {
                let line = line_buf.split_to(pos + 1);
                let line = String::from_utf8_lossy(&line[..line.len().saturating_sub(1)]).into_owned();
                let line = line.strip_prefix("data:").map(str::trim).unwrap_or(line.trim());
                if line.is_empty() {
                    continue;
                }
                let Some(chunk) = unwrap_envelope_line(line) else {
                    continue;
                };
                if !self.forward_chunk(writer, &mut claude_state, chunk).await {
                    return Ok(());
                }
                committed = true;
            }
        }

        let remainder = String::from_utf8_lossy(&line_buf).into_owned();
        let remainder = remainder.strip_prefix("data:").map(str::trim).unwrap_or(remainder.trim());
        if !remainder.is_empty()
            && let Some(chunk) = unwrap_envelope_line(remainder)
        {
            self.forward_chunk(writer, &mut claude_state, chunk).await;
        }

        if let Some(state) = claude_state.as_mut() {
            let closing = state.finish();
            send_claude_events(writer, &closing).await;
        }

        Ok(())
    }

    async fn forward_chunk(
        &self,
        writer: &ClientWriter,
        claude_state: &mut Option<GeminiToClaudeStreamState>,
        chunk: GenerateContentResponse,
    ) -> bool {
        match claude_state {
            Some(state) => {
                let stream_events = state.transform_chunk(chunk);
                send_claude_events(writer, &stream_events).await
            }
            None => {
                let Ok(data) = serde_json::to_vec(&chunk) else { return true };
                let frame = format!("data: {}\n\n", String::from_utf8_lossy(&data));
                writer.send(Bytes::from(frame)).await.is_ok()
            }
        }
    }
}

async fn send_claude_events(writer: &ClientWriter, stream_events: &[maxx_protocol::claude::stream::StreamEvent]) -> bool {
    for event in stream_events {
        let Ok(data) = serde_json::to_string(event) else { continue };
        let frame = encode_event(event.event_name(), &data);
        if writer.send(Bytes::from(frame)).await.is_err() {
            return false;
        }
    }
    true
}

async fn ensure_access_token(cfg: &AntigravityConfig) -> Result<String, ProxyError> {
    if let Some(token) = &cfg.access_token {
        if !token.is_empty() {
            return Ok(token.clone());
        }
    }
    let token = oauth::refresh_access_token(&cfg.refresh_token).await?;
    Ok(token.access_token)
}

async fn ensure_project_id(cfg: &AntigravityConfig, access_token: &str, base_url: &str) -> Result<String, ProxyError> {
    if let Some(project_id) = &cfg.project_id {
        if !project_id.is_empty() {
            return Ok(project_id.clone());
        }
    }
    oauth::detect_project_id(access_token, base_url).await
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max { s } else { &s[..max] }
}
