//! CodeWhisperer/Kiro OAuth refresh (§4.5 point 4) and the conversion from
//! a Claude `CreateMessageRequest` into the `generateAssistantResponse`
//! conversation-state shape CodeWhisperer expects.

use serde::Serialize;

use maxx_protocol::claude::request::CreateMessageRequest;
use maxx_protocol::claude::types::{ContentBlock, MessageContent, Role};
use maxx_provider_core::config::KiroConfig;
use maxx_provider_core::cooldown::CooldownReason;
use maxx_provider_core::errors::ProxyError;

use crate::http::refresh_oauth_token;

const SOCIAL_REFRESH_URL: &str = "https://prod.us-east-1.auth.desktop.kiro.dev/refreshToken";
const IDC_REFRESH_URL: &str = "https://oidc.us-east-1.amazonaws.com/token";

pub fn generate_assistant_response_url(region: &str) -> String {
    format!("https://codewhisperer.{region}.amazonaws.com/generateAssistantResponse")
}

/// Exchanges the stored refresh token for a short-lived access token.
/// `authMethod` selects the refresh shape: `social` (Kiro's own
/// device-linked refresh endpoint) vs `idc` (AWS Identity Center, a
/// standard OIDC `refresh_token` grant). Neither config carries a place to
/// persist a rotated token back (no admin-facing `Storage::update_provider`
/// exists in this build), so the refreshed token is used for this attempt
/// only (§9 open question).
pub async fn ensure_access_token(cfg: &KiroConfig) -> Result<String, ProxyError> {
    if let Some(token) = &cfg.access_token {
        if !token.is_empty() {
            return Ok(token.clone());
        }
    }

    match cfg.auth_method.as_str() {
        "idc" => {
            let form = format!(
                "grant_type=refresh_token&refresh_token={}",
                urlencoding::encode(&cfg.refresh_token)
            );
            let token = refresh_oauth_token(IDC_REFRESH_URL, &form).await?;
            Ok(token.access_token)
        }
        _ => {
            let body = serde_json::json!({ "refreshToken": cfg.refresh_token });
            let text = serde_json::to_string(&body)
                .map_err(|err| ProxyError::new(format!("encode kiro refresh body: {err}"), true, CooldownReason::Unknown))?;
            social_refresh(&text).await
        }
    }
}

async fn social_refresh(json_body: &str) -> Result<String, ProxyError> {
    let client = crate::http::shared_client();
    let resp = client
        .post(SOCIAL_REFRESH_URL)
        .header("content-type", "application/json")
        .body(json_body.to_string())
        .send()
        .await
        .map_err(|err| ProxyError::new(format!("kiro refresh request failed: {err}"), true, CooldownReason::NetworkError))?;

    let status = resp.status().as_u16();
    let bytes = resp
        .bytes()
        .await
        .map_err(|err| ProxyError::new(format!("kiro refresh read failed: {err}"), true, CooldownReason::NetworkError))?;

    if !(200..300).contains(&status) {
        let reason = if status == 401 || status == 403 {
            CooldownReason::QuotaExhausted
        } else {
            maxx_provider_core::errors::classify_http_status(status)
        };
        let text = String::from_utf8_lossy(&bytes);
        return Err(ProxyError::new(format!("kiro refresh failed ({status}): {text}"), true, reason));
    }

    #[derive(serde::Deserialize)]
    struct SocialRefreshResponse {
        #[serde(rename = "accessToken")]
        access_token: String,
    }
    let parsed: SocialRefreshResponse = serde_json::from_slice(&bytes)
        .map_err(|err| ProxyError::new(format!("kiro refresh response malformed: {err}"), true, CooldownReason::Unknown))?;
    Ok(parsed.access_token)
}

#[derive(Debug, Serialize)]
struct ConversationRequest {
    #[serde(rename = "conversationState")]
    conversation_state: ConversationState,
}

#[derive(Debug, Serialize)]
struct ConversationState {
    #[serde(rename = "chatTriggerType")]
    chat_trigger_type: &'static str,
    #[serde(rename = "conversationId")]
    conversation_id: String,
    #[serde(rename = "currentMessage")]
    current_message: CurrentMessage,
    history: Vec<HistoryTurn>,
}

#[derive(Debug, Serialize)]
struct CurrentMessage {
    #[serde(rename = "userInputMessage")]
    user_input_message: UserInputMessage,
}

#[derive(Debug, Serialize)]
struct UserInputMessage {
    content: String,
    #[serde(rename = "modelId")]
    model_id: String,
    origin: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum HistoryTurn {
    User { #[serde(rename = "userInputMessage")] user_input_message: UserInputMessage },
    Assistant { #[serde(rename = "assistantResponseMessage")] assistant_response_message: AssistantTurn },
}

#[derive(Debug, Serialize)]
struct AssistantTurn {
    content: String,
}

/// Folds a Claude `messages` array down to CodeWhisperer's flat
/// current-message-plus-history shape: the last user turn becomes
/// `currentMessage`, everything before it becomes `history`. Tool-use and
/// image blocks have no CodeWhisperer counterpart, so only text content is
/// carried across (§9 open question left unresolved by the source spec;
/// CodeWhisperer is text-chat-oriented and does not accept tool blocks).
pub fn build_conversation_request(req: &CreateMessageRequest, model_id: &str) -> serde_json::Value {
    let mut history = Vec::new();
    let mut current = UserInputMessage {
        content: String::new(),
        model_id: model_id.to_string(),
        origin: "AI_EDITOR",
    };

    let mut turns = req.messages.iter().peekable();
    while let Some(message) = turns.next() {
        let text = flatten_text(&message.content);
        let is_last = turns.peek().is_none();
        match message.role {
            Role::User if is_last => {
                current.content = text;
            }
            Role::User => {
                history.push(HistoryTurn::User {
                    user_input_message: UserInputMessage {
                        content: text,
                        model_id: model_id.to_string(),
                        origin: "AI_EDITOR",
                    },
                });
            }
            Role::Assistant => {
                history.push(HistoryTurn::Assistant {
                    assistant_response_message: AssistantTurn { content: text },
                });
            }
        }
    }

    let request = ConversationRequest {
        conversation_state: ConversationState {
            chat_trigger_type: "MANUAL",
            conversation_id: uuid::Uuid::new_v4().to_string(),
            current_message: CurrentMessage {
                user_input_message: current,
            },
            history,
        },
    };
    serde_json::to_value(&request).unwrap_or(serde_json::Value::Null)
}

fn flatten_text(content: &MessageContent) -> String {
    content
        .clone()
        .into_blocks()
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::ToolResult { content: Some(content), .. } => Some(match content {
                maxx_protocol::claude::types::ToolResultContent::Text(t) => t,
                maxx_protocol::claude::types::ToolResultContent::Blocks(blocks) => blocks
                    .into_iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            }),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxx_protocol::claude::request::CreateMessageRequest;
    use maxx_protocol::claude::types::{Message, MessageContent, Role};

    fn sample_request() -> CreateMessageRequest {
        CreateMessageRequest {
            model: "kiro-model".to_string(),
            messages: vec![
                Message { role: Role::User, content: MessageContent::Text("hi".to_string()) },
                Message { role: Role::Assistant, content: MessageContent::Text("hello".to_string()) },
                Message { role: Role::User, content: MessageContent::Text("how are you".to_string()) },
            ],
            system: None,
            max_tokens: 100,
            stream: Some(true),
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
    fn last_user_turn_becomes_current_message() {
        let value = build_conversation_request(&sample_request(), "kiro-model");
        let current = &value["conversationState"]["currentMessage"]["userInputMessage"]["content"];
        assert_eq!(current, "how are you");
        let history = value["conversationState"]["history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn generate_assistant_response_url_embeds_region() {
        assert_eq!(
            generate_assistant_response_url("us-east-1"),
            "https://codewhisperer.us-east-1.amazonaws.com/generateAssistantResponse"
        );
    }
}
