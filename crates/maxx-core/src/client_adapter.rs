//! §4.1 Client Adapter: decide which wire dialect an inbound request speaks
//! and pull out the session id, requested model and streaming flag without
//! running the full Dialect Converter.

use http::HeaderMap;
use maxx_common::ClientDialect;

#[derive(Debug, Clone)]
pub struct ExtractedInfo {
    pub session_id: String,
    pub requested_model: String,
    pub stream: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientAdapterError {
    #[error("unrecognised path: {0}")]
    UnknownPath(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Dialect detection is by URL path alone (§4.1): `/v1/messages` is Claude,
/// `/v1/chat/completions` is OpenAI, `/responses` is Codex, and a Gemini
/// path carries the operation as a `:generateContent`/`:streamGenerateContent`
/// suffix on the model segment.
pub fn match_dialect(path: &str) -> Option<ClientDialect> {
    let path = path.trim_end_matches('/');
    match path {
        "/v1/messages" => Some(ClientDialect::Claude),
        "/v1/chat/completions" => Some(ClientDialect::OpenAi),
        "/responses" => Some(ClientDialect::Codex),
        _ if path.starts_with("/v1beta/models/")
            && (path.ends_with(":generateContent") || path.ends_with(":streamGenerateContent")) =>
        {
            Some(ClientDialect::Gemini)
        }
        _ => None,
    }
}

/// Strips an optional `/project/{slug}` prefix (§6), returning the slug and
/// the path the rest of the adapter matches dialects against.
pub fn split_project_prefix(path: &str) -> (Option<&str>, &str) {
    if let Some(rest) = path.strip_prefix("/project/")
        && let Some(idx) = rest.find('/')
    {
        return (Some(&rest[..idx]), &rest[idx..]);
    }
    (None, path)
}

/// `extractInfo` (§4.1). `body` is the already-parsed JSON payload; the
/// caller owns typed deserialisation for the Dialect Converter separately.
/// `request_id` is the id the caller has already minted for this request
/// (§4.1: "sessionId falls back to requestId when neither the header nor the
/// dialect's own convention supplies one").
pub fn extract_info(
    dialect: ClientDialect,
    path: &str,
    headers: &HeaderMap,
    body: &serde_json::Value,
    request_id: &str,
) -> Result<ExtractedInfo, ClientAdapterError> {
    let requested_model = match dialect {
        ClientDialect::Gemini => model_from_gemini_path(path)
            .ok_or(ClientAdapterError::MissingField("model"))?
            .to_string(),
        _ => body
            .get("model")
            .and_then(|v| v.as_str())
            .ok_or(ClientAdapterError::MissingField("model"))?
            .to_string(),
    };

    let stream = match dialect {
        ClientDialect::Gemini => path.ends_with(":streamGenerateContent"),
        _ => {
            body.get("stream").and_then(|v| v.as_bool()).unwrap_or(false)
                || accepts_event_stream(headers)
        }
    };

    let session_id = header_str(headers, "x-session-id")
        .map(str::to_string)
        .or_else(|| claude_session_suffix(dialect, body))
        .unwrap_or_else(|| request_id.to_string());

    Ok(ExtractedInfo {
        session_id,
        requested_model,
        stream,
    })
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    header_str(headers, "accept")
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn model_from_gemini_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/v1beta/models/")?;
    let (model, _) = rest.split_once(':')?;
    Some(model)
}

/// Claude's session convention: the trailing `session_<uuid>` suffix of a
/// Claude-Code-shaped `metadata.user_id`; any other dialect, or a missing
/// header/field, leaves session id resolution to the `requestId` fallback.
fn claude_session_suffix(dialect: ClientDialect, body: &serde_json::Value) -> Option<String> {
    if dialect != ClientDialect::Claude {
        return None;
    }
    let user_id = body.get("metadata")?.get("user_id")?.as_str()?;
    user_id
        .rsplit_once("_session_")
        .map(|(_, suffix)| suffix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_all_four_dialects() {
        assert_eq!(match_dialect("/v1/messages"), Some(ClientDialect::Claude));
        assert_eq!(match_dialect("/v1/chat/completions"), Some(ClientDialect::OpenAi));
        assert_eq!(match_dialect("/responses"), Some(ClientDialect::Codex));
        assert_eq!(
            match_dialect("/v1beta/models/gemini-2.0-flash:streamGenerateContent"),
            Some(ClientDialect::Gemini)
        );
        assert_eq!(match_dialect("/unknown"), None);
    }

    #[test]
    fn splits_project_prefix() {
        assert_eq!(
            split_project_prefix("/project/acme/v1/messages"),
            (Some("acme"), "/v1/messages")
        );
        assert_eq!(split_project_prefix("/v1/messages"), (None, "/v1/messages"));
    }

    #[test]
    fn extracts_session_id_from_claude_code_user_id() {
        let body = serde_json::json!({
            "model": "claude-3-5-sonnet",
            "metadata": {"user_id": "user_abc_account__session_11111111-1111-1111-1111-111111111111"},
        });
        let info = extract_info(
            ClientDialect::Claude,
            "/v1/messages",
            &HeaderMap::new(),
            &body,
            "req-1",
        )
        .unwrap();
        assert_eq!(info.session_id, "11111111-1111-1111-1111-111111111111");
        assert_eq!(info.requested_model, "claude-3-5-sonnet");
    }

    #[test]
    fn gemini_model_comes_from_path_not_body() {
        let info = extract_info(
            ClientDialect::Gemini,
            "/v1beta/models/gemini-2.0-flash:generateContent",
            &HeaderMap::new(),
            &serde_json::json!({}),
            "req-2",
        )
        .unwrap();
        assert_eq!(info.requested_model, "gemini-2.0-flash");
        assert!(!info.stream);
    }

    #[test]
    fn session_id_falls_back_to_request_id() {
        let body = serde_json::json!({ "model": "gpt-4o" });
        let info = extract_info(
            ClientDialect::OpenAi,
            "/v1/chat/completions",
            &HeaderMap::new(),
            &body,
            "req-3",
        )
        .unwrap();
        assert_eq!(info.session_id, "req-3");
    }
}
