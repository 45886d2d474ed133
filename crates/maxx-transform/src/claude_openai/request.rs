//! Bidirectional Claude ↔ OpenAI chat-completions request conversion (§4.4):
//! "merge `system` messages into Claude's `system` field; tool messages
//! become `tool_result` content blocks; `tool_calls` become `tool_use`
//! blocks. Reverse: Claude's `system` becomes an OpenAI system message;
//! `tool_use` blocks become `assistant.tool_calls`."

use maxx_protocol::claude::request::CreateMessageRequest;
use maxx_protocol::claude::types::{
    ContentBlock, Message, MessageContent, Role as ClaudeRole, SystemPrompt, ToolChoice as ClaudeToolChoice,
    ToolDefinition as ClaudeToolDefinition, ToolResultContent,
};
use maxx_protocol::openai::request::CreateChatCompletionRequest;
use maxx_protocol::openai::types::{
    ChatMessage, FunctionCall, FunctionDefinition, Role as OpenAiRole, ToolCall,
    ToolDefinition as OpenAiToolDefinition,
};

/// Build a Claude request out of an OpenAI one (provider's native dialect is
/// Claude, client speaks OpenAI).
pub fn openai_to_claude_request(req: &CreateChatCompletionRequest, max_tokens: u32) -> CreateMessageRequest {
    let mut system_parts: Vec<String> = Vec::new();
    let mut messages: Vec<Message> = Vec::new();

    for msg in &req.messages {
        match msg.role {
            OpenAiRole::System => {
                if let Some(content) = &msg.content {
                    system_parts.push(content.clone());
                }
            }
            OpenAiRole::User => {
                messages.push(Message {
                    role: ClaudeRole::User,
                    content: MessageContent::Text(msg.content.clone().unwrap_or_default()),
                });
            }
            OpenAiRole::Assistant => {
                let mut blocks = Vec::new();
                if let Some(content) = &msg.content
                    && !content.is_empty()
                {
                    blocks.push(ContentBlock::Text {
                        text: content.clone(),
                    });
                }
                if let Some(tool_calls) = &msg.tool_calls {
                    for call in tool_calls {
                        let input = serde_json::from_str(&call.function.arguments)
                            .unwrap_or_default();
                        blocks.push(ContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.function.name.clone(),
                            input,
                        });
                    }
                }
                messages.push(Message {
                    role: ClaudeRole::Assistant,
                    content: MessageContent::Blocks(blocks),
                });
            }
            OpenAiRole::Tool => {
                let tool_use_id = msg.tool_call_id.clone().unwrap_or_default();
                messages.push(Message {
                    role: ClaudeRole::User,
                    content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                        tool_use_id,
                        content: msg
                            .content
                            .clone()
                            .map(ToolResultContent::Text),
                        is_error: None,
                    }]),
                });
            }
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(SystemPrompt::Text(system_parts.join("\n\n")))
    };

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|t| ClaudeToolDefinition {
                name: t.function.name.clone(),
                description: t.function.description.clone(),
                input_schema: t
                    .function
                    .parameters
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
            })
            .collect()
    });

    let tool_choice = req.tool_choice.as_ref().and_then(openai_tool_choice_to_claude);

    CreateMessageRequest {
        model: req.model.clone(),
        messages,
        system,
        max_tokens,
        stream: req.stream,
        tools,
        tool_choice,
        thinking: None,
        metadata: None,
        stop_sequences: None,
        temperature: req.temperature,
        top_p: req.top_p,
        betas: None,
    }
}

/// Build an OpenAI request out of a Claude one (provider's native dialect is
/// OpenAI, client speaks Claude).
pub fn claude_to_openai_request(req: &CreateMessageRequest) -> CreateChatCompletionRequest {
    let mut messages: Vec<ChatMessage> = Vec::new();

    if let Some(system) = &req.system {
        let content = match system {
            SystemPrompt::Text(text) => text.clone(),
            SystemPrompt::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        };
        messages.push(ChatMessage {
            role: OpenAiRole::System,
            content: Some(content),
            ..Default::default()
        });
    }

    for msg in &req.messages {
        let blocks = msg.content.clone().into_blocks();
        match msg.role {
            ClaudeRole::User => {
                let mut tool_results = Vec::new();
                let mut text_parts = Vec::new();
                for block in &blocks {
                    match block {
                        ContentBlock::Text { text } => text_parts.push(text.clone()),
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => tool_results.push((tool_use_id.clone(), flatten_tool_result(content))),
                        _ => {}
                    }
                }
                if !tool_results.is_empty() {
                    for (tool_use_id, content) in tool_results {
                        messages.push(ChatMessage {
                            role: OpenAiRole::Tool,
                            content: Some(content),
                            tool_call_id: Some(tool_use_id),
                            ..Default::default()
                        });
                    }
                } else {
                    messages.push(ChatMessage {
                        role: OpenAiRole::User,
                        content: Some(text_parts.join("\n\n")),
                        ..Default::default()
                    });
                }
            }
            ClaudeRole::Assistant => {
                let mut text_parts = Vec::new();
                let mut tool_calls = Vec::new();
                for block in &blocks {
                    match block {
                        ContentBlock::Text { text } => text_parts.push(text.clone()),
                        ContentBlock::ToolUse { id, name, input } => {
                            tool_calls.push(ToolCall {
                                id: id.clone(),
                                r#type: "function".to_string(),
                                function: FunctionCall {
                                    name: name.clone(),
                                    arguments: serde_json::to_string(input)
                                        .unwrap_or_else(|_| "{}".to_string()),
                                },
                            });
                        }
                        _ => {}
                    }
                }
                messages.push(ChatMessage {
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
                });
            }
        }
    }

    let tools = req.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|t| OpenAiToolDefinition {
                r#type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: Some(t.input_schema.clone()),
                },
            })
            .collect()
    });

    let tool_choice = req.tool_choice.as_ref().map(claude_tool_choice_to_openai);

    CreateChatCompletionRequest {
        model: req.model.clone(),
        messages,
        stream: req.stream,
        tools,
        tool_choice,
        max_tokens: Some(req.max_tokens),
        temperature: req.temperature,
        top_p: req.top_p,
    }
}

fn flatten_tool_result(content: &Option<ToolResultContent>) -> String {
    match content {
        None => String::new(),
        Some(ToolResultContent::Text(text)) => text.clone(),
        Some(ToolResultContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn openai_tool_choice_to_claude(value: &serde_json::Value) -> Option<ClaudeToolChoice> {
    if let Some(s) = value.as_str() {
        return Some(match s {
            "required" => ClaudeToolChoice::Any,
            "none" => ClaudeToolChoice::None,
            _ => ClaudeToolChoice::Auto,
        });
    }
    let name = value.get("function")?.get("name")?.as_str()?;
    Some(ClaudeToolChoice::Tool {
        name: name.to_string(),
    })
}

fn claude_tool_choice_to_openai(choice: &ClaudeToolChoice) -> serde_json::Value {
    match choice {
        ClaudeToolChoice::Auto => serde_json::json!("auto"),
        ClaudeToolChoice::Any => serde_json::json!("required"),
        ClaudeToolChoice::None => serde_json::json!("none"),
        ClaudeToolChoice::Tool { name } => serde_json::json!({
            "type": "function",
            "function": {"name": name},
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxx_protocol::openai::types::Role as OR;

    #[test]
    fn merges_system_messages_into_claude_system_field() {
        let req = CreateChatCompletionRequest {
            model: "gpt".to_string(),
            messages: vec![
                ChatMessage {
                    role: OR::System,
                    content: Some("be nice".to_string()),
                    ..Default::default()
                },
                ChatMessage {
                    role: OR::User,
                    content: Some("hi".to_string()),
                    ..Default::default()
                },
            ],
            stream: None,
            tools: None,
            tool_choice: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
        };
        let claude = openai_to_claude_request(&req, 1024);
        assert_eq!(claude.system, Some(SystemPrompt::Text("be nice".to_string())));
        assert_eq!(claude.messages.len(), 1);
    }

    #[test]
    fn tool_use_blocks_become_openai_tool_calls() {
        let claude = CreateMessageRequest {
            model: "claude".to_string(),
            messages: vec![Message {
                role: ClaudeRole::Assistant,
                content: MessageContent::Blocks(vec![ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "lookup".to_string(),
                    input: Default::default(),
                }]),
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
        };
        let openai = claude_to_openai_request(&claude);
        let tool_calls = openai.messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls[0].function.name, "lookup");
    }
}
