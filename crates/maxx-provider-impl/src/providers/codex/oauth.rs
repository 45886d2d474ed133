//! OpenAI/Codex OAuth silent refresh (§4.5 point 4). The interactive
//! `codex_vscode` authorize/callback dance (browser redirect to
//! `localhost:1455`) that produces the first refresh token is out of scope
//! here; only the refresh-token exchange is needed.

use maxx_provider_core::errors::ProxyError;

use crate::http::{TokenResponse, refresh_oauth_token};

pub const DEFAULT_BASE_URL: &str = "https://chatgpt.com/backend-api/codex";
const DEFAULT_ISSUER: &str = "https://auth.openai.com";
const CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
pub const CLIENT_VERSION: &str = "0.99.0";

pub async fn refresh_access_token(refresh_token: &str) -> Result<TokenResponse, ProxyError> {
    let body = format!(
        "grant_type=refresh_token&refresh_token={}&client_id={}",
        urlencoding::encode(refresh_token),
        urlencoding::encode(CLIENT_ID),
    );
    let token_url = format!("{DEFAULT_ISSUER}/oauth/token");
    refresh_oauth_token(&token_url, &body).await
}
