//! Shared upstream HTTP plumbing: one process-wide `wreq::Client`, a
//! helper that sends a request and forwards the response body to the
//! `ClientWriter` chunk by chunk, and the OAuth refresh-token exchange
//! shared by the `antigravity`/`codex` adapters.

use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;

use maxx_provider_core::cooldown::CooldownReason;
use maxx_provider_core::errors::{ProxyError, classify_http_status, classify_upstream_failure};
use maxx_provider_core::headers::Headers;
use maxx_provider_core::provider::{ClientWriter, retry_after_from_header};

static CLIENT: OnceLock<wreq::Client> = OnceLock::new();

pub fn shared_client() -> &'static wreq::Client {
    CLIENT.get_or_init(|| {
        wreq::Client::builder()
            .timeout(Duration::from_secs(900))
            .build()
            .expect("build shared upstream http client")
    })
}

pub struct UpstreamResponseMeta {
    pub status: u16,
    pub headers: Headers,
}

/// Sends `body` to `url`, forwarding every response chunk to `writer` as it
/// arrives. Once the first chunk has been forwarded the attempt is
/// committed (§4.4 rule 4, §4.5): a transport error from this point on must
/// not be reported as retryable, since the client has already seen bytes.
pub async fn send_and_stream(
    method: &str,
    url: &str,
    headers: &Headers,
    body: Bytes,
    writer: &ClientWriter,
) -> Result<UpstreamResponseMeta, ProxyError> {
    let client = shared_client();
    let method = wreq::Method::from_bytes(method.as_bytes()).unwrap_or(wreq::Method::POST);
    let mut builder = client.request(method, url);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let resp = builder
        .body(body)
        .send()
        .await
        .map_err(|err| ProxyError::new(format!("upstream request failed: {err}"), true, CooldownReason::NetworkError))?;

    let status = resp.status().as_u16();
    let resp_headers: Headers = resp
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();

    if !(200..300).contains(&status) {
        let retry_after = retry_after_from_header(&resp_headers);
        let body_text = resp.text().await.unwrap_or_default();
        let reason = classify_upstream_failure(status, &body_text);
        let mut err = ProxyError::new(
            format!("upstream returned {status}: {}", truncate(&body_text, 2048)),
            true,
            reason,
        );
        if let Some(ra) = retry_after {
            err = err.with_retry_after(ra);
        }
        return Err(err);
    }

    let mut committed = false;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| {
            ProxyError::new(
                format!("upstream stream read failed: {err}"),
                !committed,
                CooldownReason::NetworkError,
            )
        })?;
        if writer.send(chunk).await.is_err() {
            // Client disconnected; nothing left to forward.
            break;
        }
        committed = true;
    }

    Ok(UpstreamResponseMeta {
        status,
        headers: resp_headers,
    })
}

/// Sends the request and returns the raw upstream response once headers
/// have arrived, for adapters that must transform the body before it can be
/// forwarded (dialect conversion) rather than passing bytes straight
/// through. Non-2xx is classified and returned as an error exactly like
/// [`send_and_stream`]; nothing has been written to the client yet, so this
/// is always safe to retry.
pub async fn send_raw(
    method: &str,
    url: &str,
    headers: &Headers,
) -> Result<wreq::RequestBuilder, ProxyError> {
    let client = shared_client();
    let method = wreq::Method::from_bytes(method.as_bytes()).unwrap_or(wreq::Method::POST);
    let mut builder = client.request(method, url);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    Ok(builder)
}

pub async fn send_and_check(builder: wreq::RequestBuilder, body: Bytes) -> Result<wreq::Response, ProxyError> {
    let resp = builder
        .body(body)
        .send()
        .await
        .map_err(|err| ProxyError::new(format!("upstream request failed: {err}"), true, CooldownReason::NetworkError))?;

    let status = resp.status().as_u16();
    if !(200..300).contains(&status) {
        let resp_headers: Headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let retry_after = retry_after_from_header(&resp_headers);
        let body_text = resp.text().await.unwrap_or_default();
        let reason = classify_upstream_failure(status, &body_text);
        let mut err = ProxyError::new(
            format!("upstream returned {status}: {}", truncate(&body_text, 2048)),
            true,
            reason,
        );
        if let Some(ra) = retry_after {
            err = err.with_retry_after(ra);
        }
        return Err(err);
    }
    Ok(resp)
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max { s } else { &s[..max] }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// A silent `grant_type=refresh_token` exchange (§4.5 point 4); the
/// interactive authorize/callback dance that produces the first refresh
/// token is out of scope here.
pub async fn refresh_oauth_token(
    token_url: &str,
    form_body: &str,
) -> Result<TokenResponse, ProxyError> {
    let client = shared_client();
    let resp = client
        .post(token_url)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(form_body.to_string())
        .send()
        .await
        .map_err(|err| ProxyError::new(format!("oauth refresh request failed: {err}"), true, CooldownReason::NetworkError))?;

    let status = resp.status().as_u16();
    let bytes = resp
        .bytes()
        .await
        .map_err(|err| ProxyError::new(format!("oauth refresh read failed: {err}"), true, CooldownReason::NetworkError))?;

    if !(200..300).contains(&status) {
        let text = String::from_utf8_lossy(&bytes);
        let reason = if status == 401 || status == 403 {
            CooldownReason::QuotaExhausted
        } else {
            classify_http_status(status)
        };
        return Err(ProxyError::new(
            format!("oauth refresh failed ({status}): {}", truncate(&text, 1024)),
            true,
            reason,
        ));
    }

    serde_json::from_slice::<TokenResponse>(&bytes)
        .map_err(|err| ProxyError::new(format!("oauth refresh response malformed: {err}"), true, CooldownReason::Unknown))
}
