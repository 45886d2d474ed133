//! Claude-upstream request-body and header shaping (§4.4): merge `betas`
//! into the `Anthropic-Beta` header, strip `thinking` when the client forces
//! tool use, impersonate Claude Code for clients that don't already look
//! like it, and shape the outgoing headers (version/beta defaults, Stainless
//! SDK fingerprint, user-agent, and `x-api-key` vs `Authorization: Bearer`
//! depending on the upstream host).

use maxx_protocol::claude::request::CreateMessageRequest;
use maxx_protocol::claude::types::{ContentBlock, Metadata, SystemPrompt, ToolChoice};

pub type Headers = Vec<(String, String)>;

const CLAUDE_CODE_SYSTEM_PROMPT: &str = "You are Claude Code, Anthropic's official CLI for Claude.";
const CLAUDE_CODE_USER_AGENT: &str = "claude-cli/1.0.58 (external, cli)";
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct UpstreamShapeOptions<'a> {
    pub host: &'a str,
    pub api_key: &'a str,
    pub client_user_agent: Option<&'a str>,
}

/// Mutates `req` and `headers` in place so the result is ready to send
/// upstream to Anthropic's own API.
pub fn shape_claude_upstream_request(
    req: &mut CreateMessageRequest,
    headers: &mut Headers,
    opts: &UpstreamShapeOptions<'_>,
) {
    strip_thinking_when_forced_tool_use(req);

    let already_claude_code = looks_like_claude_code(opts.client_user_agent);
    if !already_claude_code {
        impersonate_claude_code(req);
    }

    shape_headers(req, headers, opts, already_claude_code);
}

/// Anthropic rejects `thinking` together with a forced tool choice; rather
/// than surface the upstream 400, drop it before it ever leaves the proxy.
fn strip_thinking_when_forced_tool_use(req: &mut CreateMessageRequest) {
    let forces_tool = matches!(
        req.tool_choice,
        Some(ToolChoice::Any) | Some(ToolChoice::Tool { .. })
    );
    if forces_tool {
        req.thinking = None;
    }
}

fn looks_like_claude_code(user_agent: Option<&str>) -> bool {
    let Some(ua) = user_agent else {
        return false;
    };
    let lower = ua.to_ascii_lowercase();
    lower.contains("claude-cli") || lower.contains("claude-code")
}

/// Injects the Claude Code system prompt at position 0 and stamps a
/// synthetic `metadata.user_id` matching the shape Anthropic's own CLI
/// sends, so clients that aren't actually Claude Code still get routed
/// through the same entitlement path.
fn impersonate_claude_code(req: &mut CreateMessageRequest) {
    req.system = Some(prepend_system_prompt(req.system.take()));

    let user_id = req
        .metadata
        .as_ref()
        .and_then(|m| m.user_id.clone())
        .filter(|id| is_claude_code_user_id(id))
        .unwrap_or_else(synthetic_user_id);
    req.metadata = Some(Metadata {
        user_id: Some(user_id),
    });
}

fn prepend_system_prompt(existing: Option<SystemPrompt>) -> SystemPrompt {
    let mut blocks = vec![ContentBlock::Text {
        text: CLAUDE_CODE_SYSTEM_PROMPT.to_string(),
    }];
    match existing {
        Some(SystemPrompt::Text(text)) if !text.is_empty() => {
            blocks.push(ContentBlock::Text { text });
        }
        Some(SystemPrompt::Blocks(existing_blocks)) => blocks.extend(existing_blocks),
        _ => {}
    }
    SystemPrompt::Blocks(blocks)
}

fn is_claude_code_user_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("user_") else {
        return false;
    };
    let Some((hex, tail)) = rest.split_once("_account__session_") else {
        return false;
    };
    hex.len() == 64
        && hex.chars().all(|c| c.is_ascii_hexdigit())
        && uuid::Uuid::parse_str(tail).is_ok()
}

fn synthetic_user_id() -> String {
    let hex: String = {
        let a = uuid::Uuid::new_v4().simple().to_string();
        let b = uuid::Uuid::new_v4().simple().to_string();
        format!("{a}{b}")
    };
    let session = uuid::Uuid::new_v4();
    format!("user_{hex}_account__session_{session}")
}

fn shape_headers(
    req: &CreateMessageRequest,
    headers: &mut Headers,
    opts: &UpstreamShapeOptions<'_>,
    already_claude_code: bool,
) {
    header_set(headers, "anthropic-version", DEFAULT_ANTHROPIC_VERSION);

    let mut betas = req.betas.clone().unwrap_or_default();
    if !already_claude_code && !betas.iter().any(|b| b == "claude-code-20250219") {
        betas.push("claude-code-20250219".to_string());
    }
    if req.thinking.is_some() && !betas.iter().any(|b| b == "interleaved-thinking-2025-05-14") {
        betas.push("interleaved-thinking-2025-05-14".to_string());
    }
    dedup_preserve_order(&mut betas);
    if !betas.is_empty() {
        header_set(headers, "anthropic-beta", betas.join(","));
    }

    header_set(headers, "x-stainless-lang", "js");
    header_set(headers, "x-stainless-package-version", "0.39.0");
    header_set(headers, "x-stainless-os", "Linux");
    header_set(headers, "x-stainless-arch", "x64");
    header_set(headers, "x-stainless-runtime", "node");
    header_set(headers, "x-stainless-runtime-version", "v20.11.0");

    let user_agent = if already_claude_code {
        opts.client_user_agent.unwrap_or(CLAUDE_CODE_USER_AGENT).to_string()
    } else {
        CLAUDE_CODE_USER_AGENT.to_string()
    };
    header_set(headers, "user-agent", user_agent);

    header_remove(headers, "x-api-key");
    header_remove(headers, "authorization");
    if opts.host.ends_with("anthropic.com") {
        header_set(headers, "x-api-key", opts.api_key);
    } else {
        header_set(headers, "authorization", format!("Bearer {}", opts.api_key));
    }
}

fn dedup_preserve_order(values: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    values.retain(|v| seen.insert(v.clone()));
}

fn header_set(headers: &mut Headers, name: &str, value: impl Into<String>) {
    let value = value.into();
    let key = name.to_ascii_lowercase();
    if let Some((_, v)) = headers.iter_mut().find(|(k, _)| k.to_ascii_lowercase() == key) {
        *v = value;
    } else {
        headers.push((name.to_string(), value));
    }
}

fn header_remove(headers: &mut Headers, name: &str) {
    let key = name.to_ascii_lowercase();
    headers.retain(|(k, _)| k.to_ascii_lowercase() != key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxx_protocol::claude::types::{Message, MessageContent, Role};

    fn base_request() -> CreateMessageRequest {
        CreateMessageRequest {
            model: "claude-sonnet-4-5".to_string(),
            messages: vec![Message {
                role: Role::User,
                content: MessageContent::Text("hi".to_string()),
            }],
            system: None,
            max_tokens: 1024,
            stream: None,
            tools: None,
            tool_choice: None,
            thinking: None,
            metadata: None,
            stop_sequences: None,
            temperature: None,
            top_p: None,
            betas: None,
        }
    }

    #[test]
    fn strips_thinking_when_tool_choice_forces_any() {
        let mut req = base_request();
        req.thinking = Some(maxx_protocol::claude::types::ThinkingConfig {
            r#type: "enabled".to_string(),
            budget_tokens: Some(1024),
        });
        req.tool_choice = Some(ToolChoice::Any);
        let mut headers = Vec::new();
        shape_claude_upstream_request(
            &mut req,
            &mut headers,
            &UpstreamShapeOptions {
                host: "api.anthropic.com",
                api_key: "sk-ant-test",
                client_user_agent: None,
            },
        );
        assert!(req.thinking.is_none());
    }

    #[test]
    fn impersonates_claude_code_for_unidentified_clients() {
        let mut req = base_request();
        let mut headers = Vec::new();
        shape_claude_upstream_request(
            &mut req,
            &mut headers,
            &UpstreamShapeOptions {
                host: "api.anthropic.com",
                api_key: "sk-ant-test",
                client_user_agent: Some("my-app/1.0"),
            },
        );
        match req.system.unwrap() {
            SystemPrompt::Blocks(blocks) => match &blocks[0] {
                ContentBlock::Text { text } => assert_eq!(text, CLAUDE_CODE_SYSTEM_PROMPT),
                _ => panic!("expected text block"),
            },
            _ => panic!("expected blocks"),
        }
        let user_id = req.metadata.unwrap().user_id.unwrap();
        assert!(is_claude_code_user_id(&user_id));
        assert_eq!(
            headers.iter().find(|(k, _)| k == "x-api-key").map(|(_, v)| v.as_str()),
            Some("sk-ant-test")
        );
    }

    #[test]
    fn leaves_already_claude_code_clients_untouched() {
        let mut req = base_request();
        req.system = Some(SystemPrompt::Text("existing".to_string()));
        let mut headers = Vec::new();
        shape_claude_upstream_request(
            &mut req,
            &mut headers,
            &UpstreamShapeOptions {
                host: "api.anthropic.com",
                api_key: "sk-ant-test",
                client_user_agent: Some("claude-cli/1.0.58 (external, cli)"),
            },
        );
        assert_eq!(req.system, Some(SystemPrompt::Text("existing".to_string())));
    }

    #[test]
    fn non_anthropic_host_uses_bearer_auth() {
        let mut req = base_request();
        let mut headers = Vec::new();
        shape_claude_upstream_request(
            &mut req,
            &mut headers,
            &UpstreamShapeOptions {
                host: "my-proxy.internal",
                api_key: "secret",
                client_user_agent: None,
            },
        );
        assert!(headers.iter().any(|(k, v)| k == "authorization" && v == "Bearer secret"));
        assert!(!headers.iter().any(|(k, _)| k == "x-api-key"));
    }

    #[test]
    fn dedups_merged_betas() {
        let mut req = base_request();
        req.betas = Some(vec!["claude-code-20250219".to_string(), "foo".to_string()]);
        let mut headers = Vec::new();
        shape_claude_upstream_request(
            &mut req,
            &mut headers,
            &UpstreamShapeOptions {
                host: "api.anthropic.com",
                api_key: "k",
                client_user_agent: None,
            },
        );
        let beta = headers.iter().find(|(k, _)| k == "anthropic-beta").unwrap().1.clone();
        assert_eq!(beta.matches("claude-code-20250219").count(), 1);
    }
}
