//! Claude → Gemini request conversion (§4.4): system becomes
//! `system_instruction`, `tool_use`/`tool_result` blocks become
//! `functionCall`/`functionResponse` parts, and `thinking` blocks round-trip
//! through `thought`/`thoughtSignature`. This is the native-dialect half of
//! the pair completed by `gemini_claude::response`/`stream`, which convert
//! the provider's reply back into Claude's wire shape.

use std::collections::HashMap;

use maxx_protocol::claude::request::CreateMessageRequest;
use maxx_protocol::claude::types::{ContentBlock, Role as ClaudeRole, SystemPrompt};
use maxx_protocol::gemini::request::{GenerateContentRequest, GenerationConfig};
use maxx_protocol::gemini::types::{
    Blob, Content, FunctionCall, FunctionDeclaration, FunctionResponse, Part, Role as GeminiRole,
    Tool,
};

pub fn claude_to_gemini_request(req: &CreateMessageRequest) -> GenerateContentRequest {
    let tool_call_names = collect_tool_call_names(req);

    let contents = req
        .messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                ClaudeRole::User => GeminiRole::User,
                ClaudeRole::Assistant => GeminiRole::Model,
            };
            let parts = msg
                .content
                .clone()
                .into_blocks()
                .into_iter()
                .filter_map(|block| content_block_to_part(block, &tool_call_names))
                .collect();
            Content {
                role: Some(role),
                parts,
            }
        })
        .collect();

    let system_instruction = req.system.as_ref().map(system_prompt_to_content);

    let tools = req.tools.as_ref().filter(|tools| !tools.is_empty()).map(|tools| {
        vec![Tool {
            function_declarations: tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: Some(t.input_schema.clone()),
                })
                .collect(),
        }]
    });

    let generation_config = Some(GenerationConfig {
        max_output_tokens: Some(req.max_tokens),
        temperature: req.temperature,
        top_p: req.top_p,
        stop_sequences: req.stop_sequences.clone(),
    });

    GenerateContentRequest {
        contents,
        system_instruction,
        tools: tools.unwrap_or_default(),
        generation_config,
    }
}

/// Gemini's `functionResponse` is keyed by function name, not a call id;
/// Claude's `tool_result` only carries the `tool_use_id`, so we walk the
/// assistant `tool_use` blocks first to recover the name.
fn collect_tool_call_names(req: &CreateMessageRequest) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for msg in &req.messages {
        if msg.role != ClaudeRole::Assistant {
            continue;
        }
        for block in msg.content.clone().into_blocks() {
            if let ContentBlock::ToolUse { id, name, .. } = block {
                names.insert(id, name);
            }
        }
    }
    names
}

fn content_block_to_part(block: ContentBlock, tool_call_names: &HashMap<String, String>) -> Option<Part> {
    match block {
        ContentBlock::Text { text } => Some(Part {
            text: Some(text),
            ..Default::default()
        }),
        ContentBlock::Thinking { thinking, signature } => Some(Part {
            text: Some(thinking),
            thought: true,
            thought_signature: signature,
            ..Default::default()
        }),
        ContentBlock::RedactedThinking { .. } => None,
        ContentBlock::ToolUse { name, input, .. } => Some(Part {
            function_call: Some(FunctionCall {
                name,
                args: serde_json::Value::Object(input.into_iter().collect()),
            }),
            ..Default::default()
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => {
            let name = tool_call_names
                .get(&tool_use_id)
                .cloned()
                .unwrap_or(tool_use_id);
            let response = match content {
                Some(maxx_protocol::claude::types::ToolResultContent::Text(text)) => {
                    serde_json::json!({ "result": text })
                }
                Some(maxx_protocol::claude::types::ToolResultContent::Blocks(blocks)) => {
                    let text: String = blocks
                        .into_iter()
                        .filter_map(|b| match b {
                            ContentBlock::Text { text } => Some(text),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    serde_json::json!({ "result": text })
                }
                None => serde_json::json!({}),
            };
            Some(Part {
                function_response: Some(FunctionResponse { name, response }),
                ..Default::default()
            })
        }
        ContentBlock::Image { source } => Some(Part {
            inline_data: Some(Blob {
                mime_type: source.media_type,
                data: source.data,
            }),
            ..Default::default()
        }),
    }
}

fn system_prompt_to_content(system: &SystemPrompt) -> Content {
    let text = match system {
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
    Content {
        role: None,
        parts: vec![Part {
            text: Some(text),
            ..Default::default()
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxx_protocol::claude::types::{Message, MessageContent};

    fn base_request(messages: Vec<Message>) -> CreateMessageRequest {
        CreateMessageRequest {
            model: "claude-sonnet-4-5".to_string(),
            messages,
            system: Some(SystemPrompt::Text("be helpful".to_string())),
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
    fn maps_system_and_user_text() {
        let req = base_request(vec![Message {
            role: ClaudeRole::User,
            content: MessageContent::Text("hello".to_string()),
        }]);
        let out = claude_to_gemini_request(&req);
        assert_eq!(out.system_instruction.unwrap().parts[0].text.as_deref(), Some("be helpful"));
        assert_eq!(out.contents[0].role, Some(GeminiRole::User));
        assert_eq!(out.contents[0].parts[0].text.as_deref(), Some("hello"));
    }

    #[test]
    fn tool_result_recovers_function_name_from_prior_tool_use() {
        let req = base_request(vec![
            Message {
                role: ClaudeRole::Assistant,
                content: MessageContent::Blocks(vec![ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "get_weather".to_string(),
                    input: Default::default(),
                }]),
            },
            Message {
                role: ClaudeRole::User,
                content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                    tool_use_id: "call_1".to_string(),
                    content: Some(maxx_protocol::claude::types::ToolResultContent::Text(
                        "sunny".to_string(),
                    )),
                    is_error: None,
                }]),
            },
        ]);
        let out = claude_to_gemini_request(&req);
        let response = out.contents[1].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "get_weather");
    }
}
