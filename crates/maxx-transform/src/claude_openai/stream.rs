//! OpenAI → Claude streaming conversion (§4.4): "on first chunk emit
//! `message_start`; on delta text content, open text block lazily then
//! `content_block_delta{type: text_delta}`; on `delta.tool_calls[i]`, if
//! new, first close any open text block, then open tool block with
//! `content_block_start{type: tool_use, id, name}`; arguments deltas become
//! `input_json_delta{partial_json}`; on `[DONE]` close all blocks, map
//! `finish_reason` ... and emit final events."
//!
//! Also the reverse direction (`ClaudeToOpenAiStreamState`): each Claude
//! stream event maps to at most one OpenAI chunk, keyed by content block
//! index for tool calls, with `message_stop` closing the stream under a
//! synthetic `finish_reason: stop` if `message_delta` never supplied one.
//!
//! Grounded on `gproxy-transform`'s `OpenAIToClaudeChatCompletionStreamState`
//! and `ClaudeToOpenAIChatCompletionStreamState`.

use std::collections::BTreeMap;

use maxx_protocol::claude::stream::{
    StreamContentBlock, StreamContentBlockDelta, StreamEvent, StreamMessage, StreamMessageDelta,
};
use maxx_protocol::claude::types::{ErrorDetail, StopReason, Usage};
use maxx_protocol::openai::stream::{ChatCompletionStreamChoice, CreateChatCompletionStreamResponse};
use maxx_protocol::openai::types::{
    ChatCompletionFunctionCallDelta, ChatCompletionMessageToolCallChunk, ChatCompletionStreamDelta,
    CompletionUsage, FinishReason, Role,
};

use crate::state::CommitTracker;

#[derive(Debug, Clone)]
struct ToolBlockInfo {
    block_index: u32,
}

#[derive(Debug, Clone)]
pub struct OpenAiToClaudeStreamState {
    id: String,
    model: String,
    message_started: bool,
    finish_emitted: bool,
    pending_finish: Option<StopReason>,
    next_block_index: u32,
    text_block_index: Option<u32>,
    tool_blocks: BTreeMap<i64, ToolBlockInfo>,
    commit: CommitTracker,
    any_content_emitted: bool,
}

impl OpenAiToClaudeStreamState {
    pub fn new() -> Self {
        Self {
            id: "unknown".to_string(),
            model: "unknown".to_string(),
            message_started: false,
            finish_emitted: false,
            pending_finish: None,
            next_block_index: 0,
            text_block_index: None,
            tool_blocks: BTreeMap::new(),
            commit: CommitTracker::new(),
            any_content_emitted: false,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.commit.is_committed()
    }

    pub fn transform_chunk(&mut self, chunk: CreateChatCompletionStreamResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if !self.message_started {
            self.id = chunk.id.clone();
            self.model = chunk.model.clone();
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

        let choice = chunk.choices.first();

        if let Some(choice) = choice {
            if let Some(content) = &choice.delta.content {
                events.extend(self.emit_text(content));
            } else if let Some(reasoning) = &choice.delta.reasoning_content {
                events.extend(self.emit_text(reasoning));
            }
            if let Some(refusal) = &choice.delta.refusal {
                events.extend(self.emit_text(refusal));
            }
            if let Some(tool_calls) = &choice.delta.tool_calls {
                for call in tool_calls {
                    events.extend(self.emit_tool_call(call));
                }
            }
            if let Some(function_call) = &choice.delta.function_call {
                events.extend(self.emit_function_call(function_call));
            }
        }

        let usage = map_usage(chunk.usage);
        let finish_reason = choice.and_then(|c| c.finish_reason).map(map_finish_reason);

        if let Some(reason) = finish_reason
            && !self.finish_emitted
        {
            events.extend(self.close_open_blocks());
            self.pending_finish = Some(reason);
        }

        if let Some(usage) = usage {
            events.extend(self.finalize(Some(usage)));
        }

        if !events.is_empty() {
            self.commit.mark();
        }
        events
    }

    /// Called on the upstream `[DONE]` marker: per §4.4 rule 5, if no usage
    /// ever arrived but content was emitted, report `output_tokens = 1`.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = self.close_open_blocks();
        if !self.finish_emitted {
            let usage = if self.any_content_emitted {
                Usage {
                    output_tokens: Some(1),
                    ..Default::default()
                }
            } else {
                Usage::default()
            };
            events.extend(self.finalize(Some(usage)));
        }
        if !events.is_empty() {
            self.commit.mark();
        }
        events
    }

    fn finalize(&mut self, usage: Option<Usage>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let Some(usage) = usage else {
            return events;
        };
        if self.finish_emitted {
            return events;
        }
        let stop_reason = self.pending_finish.take();
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

    fn emit_text(&mut self, text: &str) -> Vec<StreamEvent> {
        if text.is_empty() {
            return Vec::new();
        }
        self.any_content_emitted = true;
        let mut events = Vec::new();
        let block_index = match self.text_block_index {
            Some(index) => index,
            None => {
                let index = self.next_block_index;
                self.next_block_index += 1;
                self.text_block_index = Some(index);
                events.push(StreamEvent::ContentBlockStart {
                    index,
                    content_block: StreamContentBlock::Text {
                        text: String::new(),
                    },
                });
                index
            }
        };
        events.push(StreamEvent::ContentBlockDelta {
            index: block_index,
            delta: StreamContentBlockDelta::TextDelta {
                text: text.to_string(),
            },
        });
        events
    }

    fn emit_tool_call(&mut self, call: &ChatCompletionMessageToolCallChunk) -> Vec<StreamEvent> {
        self.any_content_emitted = true;
        let mut events = Vec::new();
        let index = call.index;
        let needs_close = self.text_block_index.is_some() && !self.tool_blocks.contains_key(&index);
        if needs_close {
            events.extend(self.close_text_block());
        }

        let info = self.tool_blocks.entry(index).or_insert_with(|| {
            let block_index = self.next_block_index;
            self.next_block_index += 1;
            let id = call.id.clone().unwrap_or_else(|| format!("toolcall-{index}"));
            let name = call
                .function
                .as_ref()
                .and_then(|f| f.name.clone())
                .unwrap_or_else(|| "tool".to_string());
            events.push(StreamEvent::ContentBlockStart {
                index: block_index,
                content_block: StreamContentBlock::ToolUse {
                    id,
                    name,
                    input: serde_json::json!({}),
                },
            });
            ToolBlockInfo { block_index }
        });

        if let Some(function) = &call.function
            && let Some(arguments) = &function.arguments
        {
            events.push(StreamEvent::ContentBlockDelta {
                index: info.block_index,
                delta: StreamContentBlockDelta::InputJsonDelta {
                    partial_json: arguments.clone(),
                },
            });
        }
        events
    }

    fn emit_function_call(&mut self, call: &ChatCompletionFunctionCallDelta) -> Vec<StreamEvent> {
        self.any_content_emitted = true;
        let mut events = Vec::new();
        let key = -1;
        let needs_close = self.text_block_index.is_some() && !self.tool_blocks.contains_key(&key);
        if needs_close {
            events.extend(self.close_text_block());
        }
        let info = self.tool_blocks.entry(key).or_insert_with(|| {
            let block_index = self.next_block_index;
            self.next_block_index += 1;
            let name = call.name.clone().unwrap_or_else(|| "function_call".to_string());
            events.push(StreamEvent::ContentBlockStart {
                index: block_index,
                content_block: StreamContentBlock::ToolUse {
                    id: "function_call".to_string(),
                    name,
                    input: serde_json::json!({}),
                },
            });
            ToolBlockInfo { block_index }
        });
        if let Some(arguments) = &call.arguments {
            events.push(StreamEvent::ContentBlockDelta {
                index: info.block_index,
                delta: StreamContentBlockDelta::InputJsonDelta {
                    partial_json: arguments.clone(),
                },
            });
        }
        events
    }

    fn close_text_block(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if let Some(index) = self.text_block_index.take() {
            events.push(StreamEvent::ContentBlockStop { index });
        }
        events
    }

    /// Close all open blocks in the order they were opened (§4.4 rule 3).
    fn close_open_blocks(&mut self) -> Vec<StreamEvent> {
        let mut events = self.close_text_block();
        let tool_blocks = std::mem::take(&mut self.tool_blocks);
        for (_, info) in tool_blocks {
            events.push(StreamEvent::ContentBlockStop {
                index: info.block_index,
            });
        }
        events
    }
}

impl Default for OpenAiToClaudeStreamState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn map_finish_reason(reason: FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ToolCalls => StopReason::ToolUse,
        FinishReason::ContentFilter => StopReason::Refusal,
    }
}

fn map_usage(usage: Option<CompletionUsage>) -> Option<Usage> {
    let usage = usage?;
    Some(Usage {
        input_tokens: Some(usage.prompt_tokens.max(0) as u32),
        output_tokens: Some(usage.completion_tokens.max(0) as u32),
        cache_creation_input_tokens: None,
        cache_read_input_tokens: None,
    })
}

#[derive(Debug, Clone)]
struct ToolCallInfo {
    id: String,
    name: String,
}

/// Claude → OpenAI streaming conversion: a provider whose native dialect is
/// Claude, feeding an OpenAI-dialect client (§4.4, §8 scenario S2). Each
/// Claude stream event produces at most one OpenAI chunk; tool-call state is
/// keyed by the Claude content block index, since that's the only identifier
/// both sides agree on across `content_block_start`/`content_block_delta`.
#[derive(Debug, Clone)]
pub struct ClaudeToOpenAiStreamState {
    id: String,
    model: String,
    tool_calls: BTreeMap<u32, ToolCallInfo>,
    finish_emitted: bool,
    commit: CommitTracker,
}

impl ClaudeToOpenAiStreamState {
    pub fn new() -> Self {
        Self {
            id: "unknown".to_string(),
            model: "unknown".to_string(),
            tool_calls: BTreeMap::new(),
            finish_emitted: false,
            commit: CommitTracker::new(),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.commit.is_committed()
    }

    /// Collapses `Done`/`Ping`/`Error` to `None`; callers that need to frame
    /// `data: [DONE]` or surface upstream errors distinctly should use
    /// [`Self::transform_event_with_control`] instead.
    pub fn transform_event(&mut self, event: StreamEvent) -> Option<CreateChatCompletionStreamResponse> {
        match self.transform_event_with_control(event) {
            Some(ClaudeToOpenAiStreamEvent::Chunk(chunk)) => Some(chunk),
            _ => None,
        }
    }

    pub fn transform_event_with_control(&mut self, event: StreamEvent) -> Option<ClaudeToOpenAiStreamEvent> {
        let out = match event {
            StreamEvent::MessageStart { message } => {
                self.id = message.id;
                self.model = message.model;
                Some(ClaudeToOpenAiStreamEvent::Chunk(self.chunk(
                    ChatCompletionStreamDelta {
                        role: Some(Role::Assistant),
                        ..Default::default()
                    },
                    None,
                    None,
                )))
            }
            StreamEvent::ContentBlockStart { index, content_block } => self
                .map_block_start(index, content_block)
                .map(ClaudeToOpenAiStreamEvent::Chunk),
            StreamEvent::ContentBlockDelta { index, delta } => {
                self.map_block_delta(index, delta).map(ClaudeToOpenAiStreamEvent::Chunk)
            }
            StreamEvent::MessageDelta { delta, usage } => {
                let finish_reason = delta.stop_reason.map(map_finish_reason_to_openai);
                if finish_reason.is_some() {
                    self.finish_emitted = true;
                }
                let usage = map_usage_to_openai(&usage);
                if finish_reason.is_none() && usage.is_none() {
                    None
                } else {
                    Some(ClaudeToOpenAiStreamEvent::Chunk(self.chunk(
                        ChatCompletionStreamDelta::default(),
                        finish_reason,
                        usage,
                    )))
                }
            }
            StreamEvent::MessageStop => {
                if !self.finish_emitted {
                    self.finish_emitted = true;
                    Some(ClaudeToOpenAiStreamEvent::Chunk(self.chunk(
                        ChatCompletionStreamDelta::default(),
                        Some(FinishReason::Stop),
                        None,
                    )))
                } else {
                    Some(ClaudeToOpenAiStreamEvent::Done)
                }
            }
            StreamEvent::Ping => Some(ClaudeToOpenAiStreamEvent::Ping),
            StreamEvent::Error { error } => Some(ClaudeToOpenAiStreamEvent::Error(error)),
            StreamEvent::ContentBlockStop { .. } => None,
        };
        if matches!(out, Some(ClaudeToOpenAiStreamEvent::Chunk(_))) {
            self.commit.mark();
        }
        out
    }

    fn map_block_start(
        &mut self,
        index: u32,
        content_block: StreamContentBlock,
    ) -> Option<CreateChatCompletionStreamResponse> {
        match content_block {
            StreamContentBlock::Text { text } => {
                if text.is_empty() { None } else { Some(self.text_chunk(text)) }
            }
            StreamContentBlock::Thinking { thinking, .. } => {
                if thinking.is_empty() { None } else { Some(self.text_chunk(thinking)) }
            }
            StreamContentBlock::ToolUse { id, name, .. } => {
                self.tool_calls.insert(index, ToolCallInfo { id, name });
                Some(self.tool_call_start(index))
            }
        }
    }

    fn map_block_delta(
        &mut self,
        index: u32,
        delta: StreamContentBlockDelta,
    ) -> Option<CreateChatCompletionStreamResponse> {
        match delta {
            StreamContentBlockDelta::TextDelta { text } => {
                if text.is_empty() { None } else { Some(self.text_chunk(text)) }
            }
            StreamContentBlockDelta::ThinkingDelta { thinking } => {
                if thinking.is_empty() { None } else { Some(self.text_chunk(thinking)) }
            }
            StreamContentBlockDelta::InputJsonDelta { partial_json } => {
                if partial_json.is_empty() {
                    None
                } else {
                    Some(self.tool_call_delta(index, partial_json))
                }
            }
            StreamContentBlockDelta::SignatureDelta { .. } => None,
        }
    }

    fn tool_call_start(&self, index: u32) -> CreateChatCompletionStreamResponse {
        let info = self.tool_calls.get(&index);
        let tool_call = ChatCompletionMessageToolCallChunk {
            index: index as i64,
            id: info.map(|tool| tool.id.clone()),
            r#type: Some("function".to_string()),
            function: Some(ChatCompletionFunctionCallDelta {
                name: info.map(|tool| tool.name.clone()),
                arguments: None,
            }),
        };
        self.chunk(
            ChatCompletionStreamDelta {
                tool_calls: Some(vec![tool_call]),
                ..Default::default()
            },
            None,
            None,
        )
    }

    fn tool_call_delta(&self, index: u32, partial_json: String) -> CreateChatCompletionStreamResponse {
        let tool_call = ChatCompletionMessageToolCallChunk {
            index: index as i64,
            id: None,
            r#type: Some("function".to_string()),
            function: Some(ChatCompletionFunctionCallDelta {
                name: None,
                arguments: Some(partial_json),
            }),
        };
        self.chunk(
            ChatCompletionStreamDelta {
                tool_calls: Some(vec![tool_call]),
                ..Default::default()
            },
            None,
            None,
        )
    }

    fn text_chunk(&self, text: String) -> CreateChatCompletionStreamResponse {
        self.chunk(
            ChatCompletionStreamDelta {
                content: Some(text),
                ..Default::default()
            },
            None,
            None,
        )
    }

    fn chunk(
        &self,
        delta: ChatCompletionStreamDelta,
        finish_reason: Option<FinishReason>,
        usage: Option<CompletionUsage>,
    ) -> CreateChatCompletionStreamResponse {
        CreateChatCompletionStreamResponse {
            id: self.id.clone(),
            model: self.model.clone(),
            choices: vec![ChatCompletionStreamChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage,
        }
    }
}

impl Default for ClaudeToOpenAiStreamState {
    fn default() -> Self {
        Self::new()
    }
}

/// The richer event surface `transform_event` collapses: distinguishes a
/// real content chunk from the stream-terminal marker, a heartbeat, and an
/// upstream error frame (all of which an SSE writer needs to encode
/// differently).
#[derive(Debug, Clone)]
pub enum ClaudeToOpenAiStreamEvent {
    Chunk(CreateChatCompletionStreamResponse),
    Done,
    Ping,
    Error(ErrorDetail),
}

fn map_finish_reason_to_openai(reason: StopReason) -> FinishReason {
    match reason {
        StopReason::EndTurn | StopReason::StopSequence => FinishReason::Stop,
        StopReason::MaxTokens => FinishReason::Length,
        StopReason::ToolUse => FinishReason::ToolCalls,
        StopReason::Refusal => FinishReason::ContentFilter,
    }
}

fn map_usage_to_openai(usage: &Usage) -> Option<CompletionUsage> {
    if usage.input_tokens.is_none() && usage.output_tokens.is_none() {
        return None;
    }
    let input_tokens = usage.input_tokens.unwrap_or(0) as i64;
    let output_tokens = usage.output_tokens.unwrap_or(0) as i64;
    Some(CompletionUsage {
        prompt_tokens: input_tokens,
        completion_tokens: output_tokens,
        total_tokens: input_tokens + output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxx_protocol::openai::stream::ChatCompletionStreamChoice;
    use maxx_protocol::openai::types::{ChatCompletionStreamDelta, Role};

    fn chunk(delta: ChatCompletionStreamDelta, finish: Option<FinishReason>) -> CreateChatCompletionStreamResponse {
        CreateChatCompletionStreamResponse {
            id: "chatcmpl-1".to_string(),
            model: "gpt-4".to_string(),
            choices: vec![ChatCompletionStreamChoice {
                index: 0,
                delta,
                finish_reason: finish,
            }],
            usage: None,
        }
    }

    #[test]
    fn first_chunk_emits_message_start_then_text_block_lazily() {
        let mut state = OpenAiToClaudeStreamState::new();
        let events = state.transform_chunk(chunk(
            ChatCompletionStreamDelta {
                role: Some(Role::Assistant),
                content: Some("hi".to_string()),
                ..Default::default()
            },
            None,
        ));
        assert!(matches!(events[0], StreamEvent::MessageStart { .. }));
        assert!(matches!(events[1], StreamEvent::ContentBlockStart { index: 0, .. }));
        assert!(matches!(events[2], StreamEvent::ContentBlockDelta { index: 0, .. }));
        assert!(state.is_committed());
    }

    #[test]
    fn tool_call_closes_open_text_block_first() {
        let mut state = OpenAiToClaudeStreamState::new();
        state.transform_chunk(chunk(
            ChatCompletionStreamDelta {
                content: Some("thinking".to_string()),
                ..Default::default()
            },
            None,
        ));
        let events = state.transform_chunk(chunk(
            ChatCompletionStreamDelta {
                tool_calls: Some(vec![ChatCompletionMessageToolCallChunk {
                    index: 0,
                    id: Some("call_1".to_string()),
                    r#type: Some("function".to_string()),
                    function: Some(ChatCompletionFunctionCallDelta {
                        name: Some("lookup".to_string()),
                        arguments: Some("{}".to_string()),
                    }),
                }]),
                ..Default::default()
            },
            None,
        ));
        assert!(matches!(events[0], StreamEvent::ContentBlockStop { index: 0 }));
        assert!(matches!(events[1], StreamEvent::ContentBlockStart { index: 1, .. }));
    }

    #[test]
    fn finish_without_usage_reports_minimum_one_output_token() {
        let mut state = OpenAiToClaudeStreamState::new();
        state.transform_chunk(chunk(
            ChatCompletionStreamDelta {
                content: Some("x".to_string()),
                ..Default::default()
            },
            None,
        ));
        let events = state.finish();
        let last_delta = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::MessageDelta { usage, .. } => Some(usage.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_delta.output_tokens, Some(1));
        assert!(matches!(events.last(), Some(StreamEvent::MessageStop)));
    }

    #[test]
    fn claude_message_start_becomes_role_only_chunk() {
        let mut state = ClaudeToOpenAiStreamState::new();
        let chunk = state
            .transform_event(StreamEvent::MessageStart {
                message: StreamMessage {
                    id: "msg_1".to_string(),
                    role: "assistant".to_string(),
                    content: Vec::new(),
                    model: "claude-3-5-sonnet".to_string(),
                    stop_reason: None,
                    stop_sequence: None,
                    r#type: "message".to_string(),
                    usage: Usage::default(),
                },
            })
            .unwrap();
        assert_eq!(chunk.choices[0].delta.role, Some(Role::Assistant));
        assert!(state.is_committed());
    }

    #[test]
    fn claude_tool_use_block_becomes_tool_call_chunk_keyed_by_block_index() {
        let mut state = ClaudeToOpenAiStreamState::new();
        let start = state
            .transform_event(StreamEvent::ContentBlockStart {
                index: 0,
                content_block: StreamContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "lookup".to_string(),
                    input: serde_json::json!({}),
                },
            })
            .unwrap();
        let tool_call = &start.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tool_call.id.as_deref(), Some("call_1"));
        assert_eq!(tool_call.function.as_ref().unwrap().name.as_deref(), Some("lookup"));

        let delta = state
            .transform_event(StreamEvent::ContentBlockDelta {
                index: 0,
                delta: StreamContentBlockDelta::InputJsonDelta {
                    partial_json: "{\"x\":1}".to_string(),
                },
            })
            .unwrap();
        let tool_call = &delta.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tool_call.function.as_ref().unwrap().arguments.as_deref(), Some("{\"x\":1}"));
    }

    #[test]
    fn claude_message_stop_without_prior_finish_reason_synthesises_stop() {
        let mut state = ClaudeToOpenAiStreamState::new();
        let chunk = state.transform_event(StreamEvent::MessageStop).unwrap();
        assert_eq!(chunk.choices[0].finish_reason, Some(FinishReason::Stop));
        assert!(matches!(
            state.transform_event_with_control(StreamEvent::MessageStop),
            Some(ClaudeToOpenAiStreamEvent::Done)
        ));
    }

    #[test]
    fn claude_message_delta_tool_use_finish_reason_maps_to_tool_calls() {
        let mut state = ClaudeToOpenAiStreamState::new();
        let chunk = state
            .transform_event(StreamEvent::MessageDelta {
                delta: StreamMessageDelta {
                    stop_reason: Some(StopReason::ToolUse),
                    stop_sequence: None,
                },
                usage: Usage {
                    input_tokens: Some(10),
                    output_tokens: Some(5),
                    cache_creation_input_tokens: None,
                    cache_read_input_tokens: None,
                },
            })
            .unwrap();
        assert_eq!(chunk.choices[0].finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(chunk.usage.unwrap().total_tokens, 15);
    }
}
