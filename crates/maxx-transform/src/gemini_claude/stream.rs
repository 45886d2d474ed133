//! Streaming Gemini → Claude conversion. The v1internal endpoint wraps each
//! streamed chunk as `{"response": {...}}`; `unwrap_envelope_line` re-frames
//! one JSON-lines line at a time (§4.5) before chunks reach the state
//! machine below, which applies the same block-open-on-first-delta and
//! ordered-finalisation rules as the OpenAI direction (§4.4).

use maxx_protocol::claude::stream::{
    StreamContentBlock, StreamContentBlockDelta, StreamEvent, StreamMessage, StreamMessageDelta,
};
use maxx_protocol::claude::types::{StopReason, Usage};
use maxx_protocol::gemini::response::GenerateContentResponse;

use crate::state::CommitTracker;

use super::response::map_finish_reason;

/// Unwrap one `{"response": {...}}` envelope line into the inner
/// `GenerateContentResponse`; returns `None` for blank lines.
pub fn unwrap_envelope_line(line: &str) -> Option<GenerateContentResponse> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let inner = value.get("response").cloned().unwrap_or(value);
    serde_json::from_value(inner).ok()
}

#[derive(Debug, Clone)]
pub struct GeminiToClaudeStreamState {
    id: String,
    model: String,
    message_started: bool,
    finish_emitted: bool,
    next_block_index: u32,
    text_block_index: Option<u32>,
    thinking_block_index: Option<u32>,
    any_tool_use: bool,
    any_content_emitted: bool,
    commit: CommitTracker,
}

impl GeminiToClaudeStreamState {
    pub fn new(message_id: String) -> Self {
        Self {
            id: message_id,
            model: "gemini".to_string(),
            message_started: false,
            finish_emitted: false,
            next_block_index: 0,
            text_block_index: None,
            thinking_block_index: None,
            any_tool_use: false,
            any_content_emitted: false,
            commit: CommitTracker::new(),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.commit.is_committed()
    }

    pub fn transform_chunk(&mut self, chunk: GenerateContentResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(model) = &chunk.model_version {
            self.model = model.clone();
        }
        if !self.message_started {
            self.message_started = true;
            events.push(StreamEvent::MessageStart {
                message: StreamMessage {
                    id: self.id.clone(),
                    role: "assistant".to_string(),
                    content: Vec::new(),
                    model: self.model.clone(),
                    stop_reason: None,
                    stop_sequence: None,
                    r#type: "message".to_string(),
                    usage: Usage::default(),
                },
            });
        }

        let candidate = chunk.candidates.first();
        if let Some(candidate) = candidate {
            for part in &candidate.content.parts {
                if part.thought {
                    if let Some(text) = &part.text
                        && !text.is_empty()
                    {
                        self.any_content_emitted = true;
                        let index = *self.thinking_block_index.get_or_insert_with(|| {
                            let index = self.next_block_index;
                            self.next_block_index += 1;
                            events.push(StreamEvent::ContentBlockStart {
                                index,
                                content_block: StreamContentBlock::Thinking {
                                    thinking: String::new(),
                                    signature: None,
                                },
                            });
                            index
                        });
                        events.push(StreamEvent::ContentBlockDelta {
                            index,
                            delta: StreamContentBlockDelta::ThinkingDelta {
                                thinking: text.clone(),
                            },
                        });
                    }
                } else if let Some(call) = &part.function_call {
                    self.any_tool_use = true;
                    self.any_content_emitted = true;
                    let block_index = self.next_block_index;
                    self.next_block_index += 1;
                    let id = format!("toolu_{}", uuid::Uuid::new_v4().simple());
                    events.push(StreamEvent::ContentBlockStart {
                        index: block_index,
                        content_block: StreamContentBlock::ToolUse {
                            id,
                            name: call.name.clone(),
                            input: serde_json::json!({}),
                        },
                    });
                    events.push(StreamEvent::ContentBlockDelta {
                        index: block_index,
                        delta: StreamContentBlockDelta::InputJsonDelta {
                            partial_json: serde_json::to_string(&call.args).unwrap_or_else(|_| "{}".to_string()),
                        },
                    });
                    events.push(StreamEvent::ContentBlockStop { index: block_index });
                } else if let Some(text) = &part.text
                    && !text.is_empty()
                {
                    self.any_content_emitted = true;
                    let index = *self.text_block_index.get_or_insert_with(|| {
                        let index = self.next_block_index;
                        self.next_block_index += 1;
                        events.push(StreamEvent::ContentBlockStart {
                            index,
                            content_block: StreamContentBlock::Text {
                                text: String::new(),
                            },
                        });
                        index
                    });
                    events.push(StreamEvent::ContentBlockDelta {
                        index,
                        delta: StreamContentBlockDelta::TextDelta { text: text.clone() },
                    });
                }
            }
        }

        let finish_reason = candidate.and_then(|c| c.finish_reason);
        if let Some(reason) = finish_reason {
            events.extend(self.finish_with_usage(
                Some(map_finish_reason(reason, self.any_tool_use)),
                chunk.usage_metadata.as_ref(),
            ));
        }

        if !events.is_empty() {
            self.commit.mark();
        }
        events
    }

    /// Terminal handling when the upstream line stream ends without an
    /// explicit `finishReason` (defensive; §4.4 rule 3 still applies).
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finish_emitted {
            return Vec::new();
        }
        let events = self.finish_with_usage(None, None);
        if !events.is_empty() {
            self.commit.mark();
        }
        events
    }

    fn finish_with_usage(
        &mut self,
        stop_reason: Option<StopReason>,
        usage_metadata: Option<&maxx_protocol::gemini::types::UsageMetadata>,
    ) -> Vec<StreamEvent> {
        if self.finish_emitted {
            return Vec::new();
        }
        let mut events = self.close_open_blocks();

        let usage = match usage_metadata {
            Some(u) => {
                let cache_read = u.cached_content_token_count;
                Usage {
                    input_tokens: Some(u.prompt_token_count.saturating_sub(cache_read)),
                    output_tokens: Some(u.candidates_token_count),
                    cache_creation_input_tokens: None,
                    cache_read_input_tokens: if cache_read > 0 { Some(cache_read) } else { None },
                }
            }
            None if self.any_content_emitted => Usage {
                output_tokens: Some(1),
                ..Default::default()
            },
            None => Usage::default(),
        };

        events.push(StreamEvent::MessageDelta {
            delta: StreamMessageDelta {
                stop_reason,
                stop_sequence: None,
            },
            usage,
        });
        events.push(StreamEvent::MessageStop);
        self.finish_emitted = true;
        events
    }

    fn close_open_blocks(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if let Some(index) = self.thinking_block_index.take() {
            events.push(StreamEvent::ContentBlockStop { index });
        }
        if let Some(index) = self.text_block_index.take() {
            events.push(StreamEvent::ContentBlockStop { index });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_response_envelope() {
        let line = r#"{"response": {"candidates": [], "modelVersion": "gemini-2.5"}}"#;
        let parsed = unwrap_envelope_line(line).unwrap();
        assert_eq!(parsed.model_version.as_deref(), Some("gemini-2.5"));
    }

    #[test]
    fn blank_line_is_ignored() {
        assert!(unwrap_envelope_line("   ").is_none());
    }
}
