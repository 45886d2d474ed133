//! `custom` provider adapter (§3 Provider.config.custom): a plain
//! API-key-and-base-URL reverse proxy with one explicit native dialect
//! (`cfg.native_dialect`, defaulting to `claude`). When the client dialect
//! matches it, the request is forwarded with only auth/header rewriting
//! (`claude` additionally gets the Claude-upstream request-body shaping,
//! §4.4, since a Claude-native custom provider is assumed to be an
//! Anthropic-API-shaped backend). When the client dialect differs, the
//! request/response/stream are routed through the Dialect Converter for the
//! pairs it actually covers: `claude` provider ↔ `openai` client in both
//! directions, and `gemini` provider ↔ `claude` client (the same direction
//! `antigravity` uses). Any other pairing — including anything involving
//! `codex`, which has no named conversion — is rejected as an unsupported
//! route rather than silently forwarded mismatched.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use maxx_protocol::claude::request::CreateMessageRequest;
use maxx_protocol::claude::response::CreateMessageResponse;
use maxx_protocol::claude::stream::StreamEvent as ClaudeStreamEvent;
use maxx_protocol::gemini::response::GenerateContentResponse;
use maxx_protocol::openai::request::CreateChatCompletionRequest;
use maxx_protocol::openai::response::CreateChatCompletionResponse;
use maxx_protocol::openai::stream::CreateChatCompletionStreamResponse;
use maxx_protocol::sse::{SseParser, encode_event};
use maxx_provider_core::config::{CustomConfig, ProviderConfig};
use maxx_provider_core::cooldown::CooldownReason;
use maxx_provider_core::errors::ProxyError;
use maxx_provider_core::events::{AdapterEvent, RequestInfo, ResponseInfo};
use maxx_provider_core::headers::Headers;
use maxx_provider_core::provider::{ClientWriter, ExecutionContext, ProviderAdapter, UpstreamInvocation};
use maxx_transform::claude_gemini::request::claude_to_gemini_request;
use maxx_transform::claude_openai::request::{claude_to_openai_request, openai_to_claude_request};
use maxx_transform::claude_openai::response::{claude_to_openai_response, openai_to_claude_response};
use maxx_transform::claude_openai::stream::{ClaudeToOpenAiStreamEvent, ClaudeToOpenAiStreamState, OpenAiToClaudeStreamState};
use maxx_transform::claude_upstream::{UpstreamShapeOptions, shape_claude_upstream_request};
use maxx_transform::gemini_claude::response::gemini_to_claude_response;
use maxx_transform::gemini_claude::stream::{GeminiToClaudeStreamState, unwrap_envelope_line};

use crate::http::{send_and_check, send_and_stream, send_raw};

const PROVIDER_NAME: &str = "custom";
const SUPPORTED_DIALECTS: &[&str] = &["claude", "openai", "gemini", "codex"];
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Default)]
pub struct CustomAdapter;

impl CustomAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderAdapter for CustomAdapter {
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
            ProviderConfig::Custom(cfg) => cfg,
            _ => {
                return Err(ProxyError::new(
                    "custom adapter given non-custom config",
                    false,
                    CooldownReason::Unknown,
                ));
            }
        };

        let base_url = cfg
            .per_client_base_url
            .get(ctx.client_dialect.as_str())
            .unwrap_or(&cfg.base_url)
            .trim_end_matches('/')
            .to_string();
        let native = native_dialect(cfg);
        let client = ctx.client_dialect.as_str();

        if client == native {
            return execute_native(ctx, cfg, &base_url, writer, request, events).await;
        }

        match (native, client) {
            ("claude", "openai") => execute_claude_provider_openai_client(ctx, cfg, &base_url, writer, request, events).await,
            ("openai", "claude") => execute_openai_provider_claude_client(cfg, &base_url, writer, request, events).await,
            ("gemini", "claude") => execute_gemini_provider_claude_client(ctx, cfg, &base_url, writer, request, events).await,
            (native, client) => Err(ProxyError::new(
                format!("custom adapter has no dialect conversion from {client} client to {native} provider"),
                false,
                CooldownReason::Unknown,
            )),
        }
    }
}

fn native_dialect(cfg: &CustomConfig) -> &str {
    if cfg.native_dialect.is_empty() { "claude" } else { cfg.native_dialect.as_str() }
}

async fn execute_native(
    ctx: &ExecutionContext,
    cfg: &CustomConfig,
    base_url: &str,
    writer: ClientWriter,
    request: UpstreamInvocation,
    events: mpsc::Sender<AdapterEvent>,
) -> Result<(), ProxyError> {
    let (url, headers, body) = build_native_request(cfg, base_url, ctx, request.body.clone(), request.stream)?;

    let _ = events
        .send(AdapterEvent::RequestInfo(RequestInfo {
            method: "POST".to_string(),
            url: url.clone(),
            headers: headers.clone(),
            body: None,
        }))
        .await;

    let meta = send_and_stream("POST", &url, &headers, body, &writer).await?;

    let _ = events
        .send(AdapterEvent::ResponseInfo(ResponseInfo {
            status: meta.status,
            headers: meta.headers,
            body: None,
        }))
        .await;

    Ok(())
}

fn build_native_request(
    cfg: &CustomConfig,
    base_url: &str,
    ctx: &ExecutionContext,
    body: Bytes,
    stream: bool,
) -> Result<(String, Headers, Bytes), ProxyError> {
    let mut headers: Headers = Vec::new();
    headers.push(("content-type".to_string(), "application/json".to_string()));
    headers.push(("accept".to_string(), "application/json".to_string()));

    match ctx.client_dialect.as_str() {
        "claude" => {
            let mut req: CreateMessageRequest = serde_json::from_slice(&body)
                .map_err(|err| ProxyError::new(format!("malformed claude request body: {err}"), false, CooldownReason::Unknown))?;
            let host = host_of(base_url);
            shape_claude_upstream_request(
                &mut req,
                &mut headers,
                &UpstreamShapeOptions {
                    host: &host,
                    api_key: &cfg.api_key,
                    client_user_agent: ctx.client_user_agent.as_deref(),
                },
            );
            let body = serde_json::to_vec(&req)
                .map_err(|err| ProxyError::new(format!("failed to re-encode claude request: {err}"), false, CooldownReason::Unknown))?;
            Ok((format!("{base_url}/v1/messages"), headers, Bytes::from(body)))
        }
        "openai" => {
            headers.push(("authorization".to_string(), format!("Bearer {}", cfg.api_key)));
            Ok((format!("{base_url}/v1/chat/completions"), headers, body))
        }
        "codex" => {
            headers.push(("authorization".to_string(), format!("Bearer {}", cfg.api_key)));
            Ok((format!("{base_url}/responses"), headers, body))
        }
        "gemini" => {
            headers.push(("x-goog-api-key".to_string(), cfg.api_key.clone()));
            let model = &ctx.mapped_model;
            let op = if stream { "streamGenerateContent" } else { "generateContent" };
            Ok((format!("{base_url}/v1beta/models/{model}:{op}"), headers, body))
        }
        other => Err(ProxyError::new(
            format!("custom adapter does not support client dialect {other}"),
            false,
            CooldownReason::Unknown,
        )),
    }
}

/// Provider speaks Claude, client speaks OpenAI chat-completions (§8
/// scenario S2): convert the inbound request, shape it the same way a
/// Claude-native client would (headers, betas, Claude-Code impersonation),
/// then fold the Claude response/stream back into OpenAI shape.
async fn execute_claude_provider_openai_client(
    ctx: &ExecutionContext,
    cfg: &CustomConfig,
    base_url: &str,
    writer: ClientWriter,
    request: UpstreamInvocation,
    events: mpsc::Sender<AdapterEvent>,
) -> Result<(), ProxyError> {
    let openai_req: CreateChatCompletionRequest = serde_json::from_slice(&request.body)
        .map_err(|err| ProxyError::new(format!("malformed openai request body: {err}"), false, CooldownReason::Unknown))?;
    let max_tokens = openai_req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    let mut claude_req = openai_to_claude_request(&openai_req, max_tokens);
    claude_req.stream = Some(request.stream);

    let mut headers: Headers = Vec::new();
    headers.push(("content-type".to_string(), "application/json".to_string()));
    headers.push(("accept".to_string(), "application/json".to_string()));
    let host = host_of(base_url);
    shape_claude_upstream_request(
        &mut claude_req,
        &mut headers,
        &UpstreamShapeOptions {
            host: &host,
            api_key: &cfg.api_key,
            client_user_agent: ctx.client_user_agent.as_deref(),
        },
    );
    let body = Bytes::from(
        serde_json::to_vec(&claude_req)
            .map_err(|err| ProxyError::new(format!("failed to re-encode claude request: {err}"), false, CooldownReason::Unknown))?,
    );
    let url = format!("{base_url}/v1/messages");

    let _ = events
        .send(AdapterEvent::RequestInfo(RequestInfo {
            method: "POST".to_string(),
            url: url.clone(),
            headers: headers.clone(),
            body: None,
        }))
        .await;

    let builder = send_raw("POST", &url, &headers).await?;
    let resp = send_and_check(builder, body).await?;
    let status = resp.status().as_u16();
    let resp_headers = response_headers(&resp);
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
            .map_err(|err| ProxyError::new(format!("upstream response read failed: {err}"), true, CooldownReason::NetworkError))?;
        let claude_resp: CreateMessageResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ProxyError::new(format!("malformed claude response: {err}"), false, CooldownReason::Unknown))?;
        let openai_resp = claude_to_openai_response(&claude_resp);
        let out = serde_json::to_vec(&openai_resp)
            .map_err(|err| ProxyError::new(format!("failed to re-encode openai response: {err}"), false, CooldownReason::Unknown))?;
        let _ = writer.send(Bytes::from(out)).await;
        return Ok(());
    }

    forward_claude_stream_as_openai(&writer, resp).await
}

async fn forward_claude_stream_as_openai(writer: &ClientWriter, resp: wreq::Response) -> Result<(), ProxyError> {
    let mut parser = SseParser::new();
    let mut state = ClaudeToOpenAiStreamState::new();
    let mut stream = resp.bytes_stream();
    let mut committed = false;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| {
            ProxyError::new(format!("upstream stream read failed: {err}"), !committed, CooldownReason::NetworkError)
        })?;
        let events = parser.push_bytes(&chunk);
        if !handle_claude_sse_events(writer, &mut state, events).await {
            return Ok(());
        }
        if state.is_committed() {
            committed = true;
        }
    }

    let remainder = parser.finish();
    handle_claude_sse_events(writer, &mut state, remainder).await;

    let _ = writer.send(Bytes::from("data: [DONE]\n\n")).await;
    Ok(())
}

async fn handle_claude_sse_events(
    writer: &ClientWriter,
    state: &mut ClaudeToOpenAiStreamState,
    events: Vec<maxx_protocol::sse::SseEvent>,
) -> bool {
    for event in events {
        let Ok(parsed) = serde_json::from_str::<ClaudeStreamEvent>(&event.data) else {
            continue;
        };
        match state.transform_event_with_control(parsed) {
            Some(ClaudeToOpenAiStreamEvent::Chunk(chunk)) => {
                let Ok(data) = serde_json::to_vec(&chunk) else { continue };
                let frame = format!("data: {}\n\n", String::from_utf8_lossy(&data));
                if writer.send(Bytes::from(frame)).await.is_err() {
                    return false;
                }
            }
            Some(ClaudeToOpenAiStreamEvent::Done) => return false,
            Some(ClaudeToOpenAiStreamEvent::Error(_)) | Some(ClaudeToOpenAiStreamEvent::Ping) | None => {}
        }
    }
    true
}

/// Provider speaks OpenAI chat-completions, client speaks Claude: the
/// reverse of the pair above, reusing the converters the other direction
/// already established.
async fn execute_openai_provider_claude_client(
    cfg: &CustomConfig,
    base_url: &str,
    writer: ClientWriter,
    request: UpstreamInvocation,
    events: mpsc::Sender<AdapterEvent>,
) -> Result<(), ProxyError> {
    let claude_req: CreateMessageRequest = serde_json::from_slice(&request.body)
        .map_err(|err| ProxyError::new(format!("malformed claude request body: {err}"), false, CooldownReason::Unknown))?;
    let mut openai_req = claude_to_openai_request(&claude_req);
    openai_req.stream = Some(request.stream);

    let mut headers: Headers = Vec::new();
    headers.push(("content-type".to_string(), "application/json".to_string()));
    headers.push(("accept".to_string(), "application/json".to_string()));
    headers.push(("authorization".to_string(), format!("Bearer {}", cfg.api_key)));
    let body = Bytes::from(
        serde_json::to_vec(&openai_req)
            .map_err(|err| ProxyError::new(format!("failed to re-encode openai request: {err}"), false, CooldownReason::Unknown))?,
    );
    let url = format!("{base_url}/v1/chat/completions");

    let _ = events
        .send(AdapterEvent::RequestInfo(RequestInfo {
            method: "POST".to_string(),
            url: url.clone(),
            headers: headers.clone(),
            body: None,
        }))
        .await;

    let builder = send_raw("POST", &url, &headers).await?;
    let resp = send_and_check(builder, body).await?;
    let status = resp.status().as_u16();
    let resp_headers = response_headers(&resp);
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
            .map_err(|err| ProxyError::new(format!("upstream response read failed: {err}"), true, CooldownReason::NetworkError))?;
        let openai_resp: CreateChatCompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ProxyError::new(format!("malformed openai response: {err}"), false, CooldownReason::Unknown))?;
        let claude_resp = openai_to_claude_response(&openai_resp);
        let out = serde_json::to_vec(&claude_resp)
            .map_err(|err| ProxyError::new(format!("failed to re-encode claude response: {err}"), false, CooldownReason::Unknown))?;
        let _ = writer.send(Bytes::from(out)).await;
        return Ok(());
    }

    forward_openai_stream_as_claude(&writer, resp).await
}

async fn forward_openai_stream_as_claude(writer: &ClientWriter, resp: wreq::Response) -> Result<(), ProxyError> {
    let mut parser = SseParser::new();
    let mut state = OpenAiToClaudeStreamState::new();
    let mut stream = resp.bytes_stream();
    let mut committed = false;
    let mut done = false;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| {
            ProxyError::new(format!("upstream stream read failed: {err}"), !committed, CooldownReason::NetworkError)
        })?;
        for event in parser.push_bytes(&chunk) {
            if event.data.trim() == "[DONE]" {
                done = true;
                break;
            }
            let Ok(parsed) = serde_json::from_str::<CreateChatCompletionStreamResponse>(&event.data) else {
                continue;
            };
            let stream_events = state.transform_chunk(parsed);
            if !send_claude_events(writer, &stream_events).await {
                return Ok(());
            }
            if state.is_committed() {
                committed = true;
            }
        }
        if done {
            break;
        }
    }

    if !done {
        for event in parser.finish() {
            if event.data.trim() != "[DONE]"
                && let Ok(parsed) = serde_json::from_str::<CreateChatCompletionStreamResponse>(&event.data)
            {
                let stream_events = state.transform_chunk(parsed);
                if !send_claude_events(writer, &stream_events).await {
                    return Ok(());
                }
            }
        }
    }

    let closing = state.finish();
    send_claude_events(writer, &closing).await;
    Ok(())
}

/// Provider speaks Gemini, client speaks Claude: the same direction
/// `antigravity` bridges, applied to a plain `generateContent` backend
/// instead of the wrapped `v1internal` one.
async fn execute_gemini_provider_claude_client(
    ctx: &ExecutionContext,
    cfg: &CustomConfig,
    base_url: &str,
    writer: ClientWriter,
    request: UpstreamInvocation,
    events: mpsc::Sender<AdapterEvent>,
) -> Result<(), ProxyError> {
    let claude_req: CreateMessageRequest = serde_json::from_slice(&request.body)
        .map_err(|err| ProxyError::new(format!("malformed claude request body: {err}"), false, CooldownReason::Unknown))?;
    let gemini_req = claude_to_gemini_request(&claude_req);
    let body = Bytes::from(
        serde_json::to_vec(&gemini_req)
            .map_err(|err| ProxyError::new(format!("failed to re-encode gemini request: {err}"), false, CooldownReason::Unknown))?,
    );

    let mut headers: Headers = Vec::new();
    headers.push(("content-type".to_string(), "application/json".to_string()));
    headers.push(("accept".to_string(), "application/json".to_string()));
    headers.push(("x-goog-api-key".to_string(), cfg.api_key.clone()));
    let model = &ctx.mapped_model;
    let url = if request.stream {
        format!("{base_url}/v1beta/models/{model}:streamGenerateContent?alt=sse")
    } else {
        format!("{base_url}/v1beta/models/{model}:generateContent")
    };

    let _ = events
        .send(AdapterEvent::RequestInfo(RequestInfo {
            method: "POST".to_string(),
            url: url.clone(),
            headers: headers.clone(),
            body: None,
        }))
        .await;

    let builder = send_raw("POST", &url, &headers).await?;
    let resp = send_and_check(builder, body).await?;
    let status = resp.status().as_u16();
    let resp_headers = response_headers(&resp);
    let _ = events
        .send(AdapterEvent::ResponseInfo(ResponseInfo {
            status,
            headers: resp_headers,
            body: None,
        }))
        .await;

    let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());

    if !request.stream {
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| ProxyError::new(format!("upstream response read failed: {err}"), true, CooldownReason::NetworkError))?;
        let gemini_resp: GenerateContentResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ProxyError::new(format!("malformed gemini response: {err}"), false, CooldownReason::Unknown))?;
        let claude_resp = gemini_to_claude_response(&gemini_resp, &message_id);
        let out = serde_json::to_vec(&claude_resp)
            .map_err(|err| ProxyError::new(format!("failed to re-encode claude response: {err}"), false, CooldownReason::Unknown))?;
        let _ = writer.send(Bytes::from(out)).await;
        return Ok(());
    }

    forward_gemini_stream_as_claude(&writer, resp, message_id).await
}

async fn forward_gemini_stream_as_claude(
    writer: &ClientWriter,
    resp: wreq::Response,
    message_id: String,
) -> Result<(), ProxyError> {
    let mut line_buf = BytesMut::new();
    let mut stream = resp.bytes_stream();
    let mut committed = false;
    let mut state = GeminiToClaudeStreamState::new(message_id);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| {
            ProxyError::new(format!("upstream stream read failed: {err}"), !committed, CooldownReason::NetworkError)
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
            let stream_events = state.transform_chunk(chunk);
            if !send_claude_events(writer, &stream_events).await {
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
        let stream_events = state.transform_chunk(chunk);
        send_claude_events(writer, &stream_events).await;
    }

    let closing = state.finish();
    send_claude_events(writer, &closing).await;
    Ok(())
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

fn response_headers(resp: &wreq::Response) -> Headers {
    resp.headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect()
}

fn host_of(base_url: &str) -> String {
    base_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(base_url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_of_strips_scheme_and_path() {
        assert_eq!(host_of("https://api.anthropic.com/v1"), "api.anthropic.com");
        assert_eq!(host_of("http://localhost:8080"), "localhost:8080");
    }

    #[test]
    fn native_dialect_defaults_to_claude_when_unset() {
        let cfg = CustomConfig::default();
        assert_eq!(native_dialect(&cfg), "claude");
    }

    #[test]
    fn native_dialect_honours_explicit_value() {
        let cfg = CustomConfig {
            native_dialect: "openai".to_string(),
            ..Default::default()
        };
        assert_eq!(native_dialect(&cfg), "openai");
    }
}
