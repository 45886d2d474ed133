//! Non-streaming OpenAI ↔ Claude response conversion, following the same
//! tool-call/tool-result mapping rules as the request side (§4.4).

use maxx_protocol::claude::response::CreateMessageResponse;
use maxx_protocol::claude::types::{ContentBlock, Role as ClaudeRole, StopReason, Usage};
use maxx_protocol::openai::response::{ChatCompletionChoice, CreateChatCompletionResponse};
use maxx_protocol::openai::types::{ChatMessage, FunctionCall, Role as OpenAiRole, ToolCall};

pub fn openai_to_claude_response(resp: &CreateChatCompletionResponse) -> CreateMessageResponse {
    let choice = resp.choices.first();
    let message = choice.map(|c| &c.message);

    let mut content = Vec::new();
    if let Some(message) = message {
        if let Some(text) = &message.content
            && !text.is_empty()
        {
            content.push(ContentBlock::Text { text: text.clone() });
        }
        if let Some(tool_calls) = &message.tool_calls {
            for call in tool_calls {
                let input = serde_json::from_str(&call.function.arguments).unwrap_or_default();
                content.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    input,
                });
            }
        }
    }

    let stop_reason = choice
        .and_then(|c| c.finish_reason)
        .map(super::stream::map_finish_reason);

    let usage = resp
        .usage
        .as_ref()
        .map(|u| Usage {
            input_tokens: Some(u.prompt_tokens.max(0) as u32),
            output_tokens: Some(u.completion_tokens.max(0) as u32),
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
        })
        .unwrap_or_default();

    CreateMessageResponse {
        id: resp.id.clone(),
        r#type: "message".to_string(),
        role: ClaudeRole::Assistant,
        content,
        model: resp.model.clone(),
        stop_reason,
        stop_sequence: None,
        usage,
    }
}

pub fn claude_to_openai_response(resp: &CreateMessageResponse) -> CreateChatCompletionResponse {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in &resp.content {
        match block {
            ContentBlock::Text { text } => text_parts.push(text.clone()),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id: id.clone(),
                r#type: "function".to_string(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string()),
                },
            }),
            _ => {}
        }
    }

    let finish_reason = resp.stop_reason.map(|reason| match reason {
        StopReason::EndTurn | StopReason::StopSequence => {
            maxx_protocol::openai::types::FinishReason::Stop
        }
        StopReason::MaxTokens => maxx_protocol::openai::types::FinishReason::Length,
        StopReason::ToolUse => maxx_protocol::openai::types::FinishReason::ToolCalls,
        StopReason::Refusal => maxx_protocol::openai::types::FinishReason::ContentFilter,
    });

    CreateChatCompletionResponse {
        id: resp.id.clone(),
        object: "chat.completion".to_string(),
        model: resp.model.clone(),
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: ChatMessage {
                role: OpenAiRole::Assistant,
                content: if text_parts.is_empty() {
                    None
                } else {
                    Some(text_parts.join("\n\n"))
                },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                ..Default::default()
            },
            finish_reason,
        }],
        usage: Some(maxx_protocol::openai::types::CompletionUsage {
            prompt_tokens: resp.usage.input_tokens.unwrap_or(0) as i64,
            completion_tokens: resp.usage.output_tokens.unwrap_or(0) as i64,
            total_tokens: (resp.usage.input_tokens.unwrap_or(0) + resp.usage.output_tokens.unwrap_or(0))
                as i64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_response_round_trips_through_openai_shape() {
        let resp = CreateMessageResponse {
            id: "msg_1".to_string(),
            r#type: "message".to_string(),
            role: ClaudeRole::Assistant,
            content: vec![ContentBlock::Text {
                text: "hello".to_string(),
            }],
            model: "claude".to_string(),
            stop_reason: Some(StopReason::EndTurn),
            stop_sequence: None,
            usage: Usage {
                input_tokens: Some(3),
                output_tokens: Some(1),
                cache_creation_input_tokens: None,
                cache_read_input_tokens: None,
            },
        };
        let openai = claude_to_openai_response(&resp);
        assert_eq!(openai.choices[0].message.content.as_deref(), Some("hello"));
        assert_eq!(
            openai.choices[0].finish_reason,
            Some(maxx_protocol::openai::types::FinishReason::Stop)
        );
    }
}
