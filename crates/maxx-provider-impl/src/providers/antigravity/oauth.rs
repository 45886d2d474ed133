//! Google OAuth refresh plus the Code Assist project-id discovery dance
//! (§4.5 point 4): `loadCodeAssist` first, falling back to `onboardUser`
//! when the account has no project bound yet. The interactive
//! authorize/callback flow that produces the first refresh token is out of
//! scope; only the refresh-token exchange and the project-id lookup that
//! follows it are needed here.

use std::time::Duration;

use maxx_provider_core::cooldown::CooldownReason;
use maxx_provider_core::errors::ProxyError;

use crate::http::{TokenResponse, refresh_oauth_token, shared_client};

pub const DEFAULT_BASE_URL: &str = "https://daily-cloudcode-pa.sandbox.googleapis.com";
pub const ANTIGRAVITY_USER_AGENT: &str = "antigravity/1.15.8 (Windows; AMD64)";
const CLIENT_ID: &str = "1071006060591-tmhssin2h21lcre235vtolojh4g403ep.apps.googleusercontent.com";
const CLIENT_SECRET: &str = "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";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub async fn refresh_access_token(refresh_token: &str) -> Result<TokenResponse, ProxyError> {
    let body = format!(
        "refresh_token={}&client_id={}&client_secret={}&grant_type=refresh_token",
        urlencoding::encode(refresh_token),
        urlencoding::encode(CLIENT_ID),
        urlencoding::encode(CLIENT_SECRET),
    );
    refresh_oauth_token(TOKEN_URL, &body).await
}

/// `loadCodeAssist`, falling back to `onboardUser` for accounts with no
/// project bound yet (tier defaults to the `isDefault` entry, or `LEGACY`).
/// Nothing persists the discovered id back into storage in this build (§9
/// open question, same as the refreshed access token), so it is
/// rediscovered on demand whenever the configured `project_id` is absent.
pub async fn detect_project_id(access_token: &str, base_url: &str) -> Result<String, ProxyError> {
    if let Some(project_id) = try_load_code_assist(access_token, base_url).await? {
        return Ok(project_id);
    }
    try_onboard_user(access_token, base_url).await
}

async fn try_load_code_assist(access_token: &str, base_url: &str) -> Result<Option<String>, ProxyError> {
    let client = shared_client();
    let url = format!("{}/v1internal:loadCodeAssist", base_url.trim_end_matches('/'));
    let body = serde_json::json!({
        "metadata": { "ideType": "ANTIGRAVITY", "platform": "PLATFORM_UNSPECIFIED", "pluginType": "GEMINI" }
    });
    let resp = client
        .post(url)
        .header("authorization", format!("Bearer {access_token}"))
        .header("user-agent", ANTIGRAVITY_USER_AGENT)
        .header("content-type", "application/json")
        .header("accept-encoding", "gzip")
        .body(serde_json::to_vec(&body).unwrap_or_default())
        .send()
        .await
        .map_err(|err| ProxyError::new(format!("loadCodeAssist failed: {err}"), true, CooldownReason::NetworkError))?;

    if !resp.status().is_success() {
        return Ok(None);
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|err| ProxyError::new(format!("loadCodeAssist read failed: {err}"), true, CooldownReason::NetworkError))?;
    let payload: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|err| ProxyError::new(format!("loadCodeAssist response malformed: {err}"), true, CooldownReason::Unknown))?;

    if payload.get("currentTier").map(|v| v.is_null()).unwrap_or(true) {
        return Ok(None);
    }
    Ok(payload
        .get("cloudaicompanionProject")
        .and_then(|v| v.as_str())
        .map(str::to_string))
}

async fn try_onboard_user(access_token: &str, base_url: &str) -> Result<String, ProxyError> {
    let tier_id = onboard_tier(access_token, base_url).await?;
    let client = shared_client();
    let url = format!("{}/v1internal:onboardUser", base_url.trim_end_matches('/'));
    let body = serde_json::json!({
        "tierId": tier_id,
        "metadata": { "ideType": "ANTIGRAVITY", "platform": "PLATFORM_UNSPECIFIED", "pluginType": "GEMINI" }
    });
    let body_bytes = serde_json::to_vec(&body).unwrap_or_default();

    for _ in 0..5 {
        let resp = client
            .post(url.clone())
            .header("authorization", format!("Bearer {access_token}"))
            .header("user-agent", ANTIGRAVITY_USER_AGENT)
            .header("content-type", "application/json")
            .header("accept-encoding", "gzip")
            .body(body_bytes.clone())
            .send()
            .await
            .map_err(|err| ProxyError::new(format!("onboardUser failed: {err}"), true, CooldownReason::NetworkError))?;
        if !resp.status().is_success() {
            return Err(ProxyError::new(
                format!("onboardUser failed: {}", resp.status()),
                true,
                CooldownReason::Unknown,
            ));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| ProxyError::new(format!("onboardUser read failed: {err}"), true, CooldownReason::NetworkError))?;
        let payload: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|err| ProxyError::new(format!("onboardUser response malformed: {err}"), true, CooldownReason::Unknown))?;
        if payload.get("done").and_then(|v| v.as_bool()) == Some(true) {
            let project = payload.get("response").and_then(|v| v.get("cloudaicompanionProject"));
            let project_id = project
                .and_then(|v| v.get("id"))
                .and_then(|v| v.as_str())
                .or_else(|| project.and_then(|v| v.as_str()))
                .map(str::to_string);
            return project_id.ok_or_else(|| {
                ProxyError::new("onboardUser completed without a project id", false, CooldownReason::Unknown)
            });
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Err(ProxyError::new("onboardUser did not complete in time", true, CooldownReason::Unknown))
}

async fn onboard_tier(access_token: &str, base_url: &str) -> Result<String, ProxyError> {
    let client = shared_client();
    let url = format!("{}/v1internal:loadCodeAssist", base_url.trim_end_matches('/'));
    let body = serde_json::json!({
        "metadata": { "ideType": "ANTIGRAVITY", "platform": "PLATFORM_UNSPECIFIED", "pluginType": "GEMINI" }
    });
    let resp = client
        .post(url)
        .header("authorization", format!("Bearer {access_token}"))
        .header("user-agent", ANTIGRAVITY_USER_AGENT)
        .header("content-type", "application/json")
        .header("accept-encoding", "gzip")
        .body(serde_json::to_vec(&body).unwrap_or_default())
        .send()
        .await
        .map_err(|err| ProxyError::new(format!("loadCodeAssist failed: {err}"), true, CooldownReason::NetworkError))?;
    if !resp.status().is_success() {
        return Ok("LEGACY".to_string());
    }
    let bytes = resp.bytes().await.unwrap_or_default();
    let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    let tiers = payload.get("allowedTiers").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    for tier in tiers {
        if tier.get("isDefault").and_then(|v| v.as_bool()) == Some(true)
            && let Some(id) = tier.get("id").and_then(|v| v.as_str())
        {
            return Ok(id.to_string());
        }
    }
    Ok("LEGACY".to_string())
}

pub fn make_request_id() -> String {
    format!("maxx-{}", uuid::Uuid::new_v4().simple())
}

/// Strips the Chinese fake-stream/anti-truncation markers some Antigravity
/// model ids carry (§4.4 normalisation).
pub fn normalize_model_name(model: &str) -> String {
    const FAKE_PREFIX: &str = "\u{5047}\u{6d41}\u{5f0f}/";
    const ANTI_TRUNC_PREFIX: &str = "\u{6d41}\u{5f0f}\u{6297}\u{622a}\u{65ad}/";
    const FAKE_SUFFIX: &str = "\u{5047}\u{6d41}\u{5f0f}";
    const ANTI_TRUNC_SUFFIX: &str = "\u{6d41}\u{5f0f}\u{6297}\u{622a}\u{65ad}";

    let mut name = model.strip_prefix("models/").unwrap_or(model).trim();
    for prefix in [FAKE_PREFIX, ANTI_TRUNC_PREFIX] {
        if let Some(stripped) = name.strip_prefix(prefix) {
            name = stripped;
        }
    }
    if let Some(stripped) = name.strip_suffix(FAKE_SUFFIX) {
        name = stripped.trim_end_matches('-');
    }
    if let Some(stripped) = name.strip_suffix(ANTI_TRUNC_SUFFIX) {
        name = stripped.trim_end_matches('-');
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_fake_stream_marker() {
        assert_eq!(normalize_model_name("models/gemini-2.5-pro"), "gemini-2.5-pro");
    }

    #[test]
    fn normalize_is_noop_on_plain_model() {
        assert_eq!(normalize_model_name("gemini-2.5-flash"), "gemini-2.5-flash");
    }
}
