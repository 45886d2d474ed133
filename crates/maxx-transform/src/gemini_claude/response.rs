//! Non-streaming Gemini → Claude response conversion (§4.4): "iterate
//! `candidates[0].content.parts`; `thought` or part with `thoughtSignature`
//! emits a `thinking` block; `functionCall` emits `tool_use`; `inlineData`
//! is rendered as Markdown image; `text` emits `text`. A trailing signature
//! on an empty text part is attached to the next block. Map `finishReason`:
//! `STOP`→`end_turn` (or `tool_use` if any tool block was emitted),
//! `MAX_TOKENS`→`max_tokens`. Build usage from `usageMetadata`: `input =
//! promptTokens − cachedContentTokens`, `output = candidatesTokens`, attach
//! `cache_read_input_tokens` if non-zero."

use maxx_protocol::claude::response::CreateMessageResponse;
use maxx_protocol::claude::types::{ContentBlock, Role, StopReason, Usage};
use maxx_protocol::gemini::response::GenerateContentResponse;
use maxx_protocol::gemini::types::{FinishReason, Part};

pub fn gemini_to_claude_response(resp: &GenerateContentResponse, message_id: &str) -> CreateMessageResponse {
    let candidate = resp.candidates.first();
    let model = resp.model_version.clone().unwrap_or_else(|| "gemini".to_string());

    let mut content = Vec::new();
    let mut any_tool_use = false;
    if let Some(candidate) = candidate {
        let mut pending_signature: Option<String> = None;
        for part in &candidate.content.parts {
            if is_signature_only(part) {
                pending_signature = part.thought_signature.clone();
                continue;
            }
            let signature = part.thought_signature.clone().or_else(|| pending_signature.take());

            if part.thought {
                content.push(ContentBlock::Thinking {
                    thinking: part.text.clone().unwrap_or_default(),
                    signature,
                });
            } else if let Some(call) = &part.function_call {
                any_tool_use = true;
                let input = serde_json::from_value(call.args.clone()).unwrap_or_default();
                content.push(ContentBlock::ToolUse {
                    id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
                    name: call.name.clone(),
                    input,
                });
            } else if let Some(blob) = &part.inline_data {
                content.push(ContentBlock::Text {
                    text: format!("![image](data:{};base64,{})", blob.mime_type, blob.data),
                });
            } else if let Some(text) = &part.text {
                content.push(ContentBlock::Text { text: text.clone() });
            }
        }
    }

    let stop_reason = candidate.and_then(|c| c.finish_reason).map(|reason| {
        map_finish_reason(reason, any_tool_use)
    });

    let usage = resp
        .usage_metadata
        .as_ref()
        .map(|u| {
            let cache_read = u.cached_content_token_count;
            Usage {
                input_tokens: Some(u.prompt_token_count.saturating_sub(cache_read)),
                output_tokens: Some(u.candidates_token_count),
                cache_creation_input_tokens: None,
                cache_read_input_tokens: if cache_read > 0 { Some(cache_read) } else { None },
            }
        })
        .unwrap_or_default();

    CreateMessageResponse {
        id: message_id.to_string(),
        r#type: "message".to_string(),
        role: Role::Assistant,
        content,
        model,
        stop_reason,
        stop_sequence: None,
        usage,
    }
}

fn is_signature_only(part: &Part) -> bool {
    part.thought_signature.is_some()
        && part.text.as_deref().unwrap_or("").is_empty()
        && !part.thought
        && part.function_call.is_none()
        && part.inline_data.is_none()
}

pub fn map_finish_reason(reason: FinishReason, any_tool_use: bool) -> StopReason {
    match reason {
        FinishReason::Stop if any_tool_use => StopReason::ToolUse,
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::MaxTokens => StopReason::MaxTokens,
        FinishReason::Safety => StopReason::Refusal,
        FinishReason::Recitation | FinishReason::Other => StopReason::EndTurn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxx_protocol::gemini::response::Candidate;
    use maxx_protocol::gemini::types::{Content, FunctionCall, UsageMetadata};

    #[test]
    fn function_call_part_emits_tool_use_and_flips_stop_reason() {
        let resp = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Content {
                    role: None,
                    parts: vec![Part {
                        function_call: Some(FunctionCall {
                            name: "lookup".to_string(),
                            args: serde_json::json!({"q": "x"}),
                        }),
                        ..Default::default()
                    }],
                },
                finish_reason: Some(FinishReason::Stop),
                index: 0,
            }],
            usage_metadata: Some(UsageMetadata {
                prompt_token_count: 10,
                candidates_token_count: 5,
                cached_content_token_count: 2,
                total_token_count: 15,
            }),
            model_version: Some("gemini-2.5".to_string()),
        };
        let claude = gemini_to_claude_response(&resp, "msg_1");
        assert!(matches!(claude.content[0], ContentBlock::ToolUse { .. }));
        assert_eq!(claude.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(claude.usage.input_tokens, Some(8));
        assert_eq!(claude.usage.cache_read_input_tokens, Some(2));
    }
}
