//! "The payload is JSON whose interpretation depends on `:event-type`:
//! `assistantResponseEvent` (text delta), `toolUseEvent`
//! (`{toolUseId, name, input, stop}`), `codeEvent`, `endOfTurnEvent`, plus
//! nested forms (`{assistantResponseEvent: {...}}`). The Claude message
//! processor maps these onto Claude SSE events subject to the general
//! rules. Exception events with type `ContentLengthExceededException`
//! short-circuit: close open blocks, emit a `message_delta` with
//! `stop_reason = max_tokens` and `message_stop`, and mark the stream
//! terminated." (§4.4)

use std::collections::BTreeMap;

use maxx_protocol::aws_eventstream::{EventStreamFrame, KiroEvent};
use maxx_protocol::claude::stream::{
    StreamContentBlock, StreamContentBlockDelta, StreamEvent, StreamMessage, StreamMessageDelta,
};
use maxx_protocol::claude::types::{StopReason, Usage};

use crate::state::CommitTracker;

#[derive(Debug, Clone)]
pub struct KiroToClaudeStreamState {
    id: String,
    model: String,
    message_started: bool,
    finish_emitted: bool,
    terminated: bool,
    next_block_index: u32,
    text_block_index: Option<u32>,
    tool_blocks: BTreeMap<String, u32>,
    any_tool_use: bool,
    any_content_emitted: bool,
    commit: CommitTracker,
}

impl KiroToClaudeStreamState {
    pub fn new(message_id: String, model: String) -> Self {
        Self {
            id: message_id,
            model,
            message_started: false,
            finish_emitted: false,
            terminated: false,
            next_block_index: 0,
            text_block_index: None,
            tool_blocks: BTreeMap::new(),
            any_tool_use: false,
            any_content_emitted: false,
            commit: CommitTracker::new(),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.commit.is_committed()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn ensure_started(&mut self, events: &mut Vec<StreamEvent>) {
        if self.message_started {
            return;
        }
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

    pub fn transform_frame(&mut self, frame: EventStreamFrame) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.terminated {
            return events;
        }
        self.ensure_started(&mut events);

        if let Some(exception) = &frame.exception_type {
            if exception == "ContentLengthExceededException" {
                events.extend(self.close_open_blocks());
                events.push(StreamEvent::MessageDelta {
                    delta: StreamMessageDelta {
                        stop_reason: Some(StopReason::MaxTokens),
                        stop_sequence: None,
                    },
                    usage: self.minimum_usage(),
                });
                events.push(StreamEvent::MessageStop);
                self.finish_emitted = true;
                self.terminated = true;
            }
            if !events.is_empty() {
                self.commit.mark();
            }
            return events;
        }

        let Ok(event) = serde_json::from_slice::<KiroEvent>(&frame.payload) else {
            return events;
        };

        match event {
            KiroEvent::AssistantResponse {
                assistant_response_event,
            } => events.extend(self.emit_text(&assistant_response_event.content)),
            KiroEvent::Bare(inner) => events.extend(self.emit_text(&inner.content)),
            KiroEvent::CodeEvent { code_event } => events.extend(self.emit_text(&code_event.content)),
            KiroEvent::ToolUse(tool) => events.extend(self.emit_tool_use(
                &tool.tool_use_id,
                &tool.name,
                tool.input.as_ref(),
                tool.stop,
            )),
            KiroEvent::EndOfTurn { .. } => events.extend(self.finish(None)),
        }

        if !events.is_empty() {
            self.commit.mark();
        }
        events
    }

    /// Normal-completion finalisation (connection closed without an
    /// `endOfTurnEvent`, or one arrived explicitly).
    pub fn finish(&mut self, stop_reason: Option<StopReason>) -> Vec<StreamEvent> {
        if self.finish_emitted {
            return Vec::new();
        }
        let mut events = self.close_open_blocks();
        let reason = stop_reason.unwrap_or(if self.any_tool_use {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        });
        events.push(StreamEvent::MessageDelta {
            delta: StreamMessageDelta {
                stop_reason: Some(reason),
                stop_sequence: None,
            },
            usage: self.minimum_usage(),
        });
        events.push(StreamEvent::MessageStop);
        self.finish_emitted = true;
        if !events.is_empty() {
            self.commit.mark();
        }
        events
    }

    fn minimum_usage(&self) -> Usage {
        if self.any_content_emitted {
            Usage {
                output_tokens: Some(1),
                ..Default::default()
            }
        } else {
            Usage::default()
        }
    }

    fn emit_text(&mut self, text: &str) -> Vec<StreamEvent> {
        if text.is_empty() {
            return Vec::new();
        }
        self.any_content_emitted = true;
        let mut events = Vec::new();
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
            delta: StreamContentBlockDelta::TextDelta {
                text: text.to_string(),
            },
        });
        events
    }

    fn emit_tool_use(
        &mut self,
        tool_use_id: &str,
        name: &str,
        input: Option<&serde_json::Value>,
        stop: bool,
    ) -> Vec<StreamEvent> {
        self.any_tool_use = true;
        self.any_content_emitted = true;
        let mut events = Vec::new();
        let is_new = !self.tool_blocks.contains_key(tool_use_id);
        if is_new {
            if let Some(text_index) = self.text_block_index.take() {
                events.push(StreamEvent::ContentBlockStop { index: text_index });
            }
            let block_index = self.next_block_index;
            self.next_block_index += 1;
            self.tool_blocks.insert(tool_use_id.to_string(), block_index);
            events.push(StreamEvent::ContentBlockStart {
                index: block_index,
                content_block: StreamContentBlock::ToolUse {
                    id: tool_use_id.to_string(),
                    name: name.to_string(),
                    input: serde_json::json!({}),
                },
            });
        }
        let block_index = self.tool_blocks[tool_use_id];
        if let Some(input) = input {
            events.push(StreamEvent::ContentBlockDelta {
                index: block_index,
                delta: StreamContentBlockDelta::InputJsonDelta {
                    partial_json: serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string()),
                },
            });
        }
        if stop {
            self.tool_blocks.remove(tool_use_id);
            events.push(StreamEvent::ContentBlockStop { index: block_index });
        }
        events
    }

    fn close_open_blocks(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if let Some(index) = self.text_block_index.take() {
            events.push(StreamEvent::ContentBlockStop { index });
        }
        let tool_blocks = std::mem::take(&mut self.tool_blocks);
        for (_, index) in tool_blocks {
            events.push(StreamEvent::ContentBlockStop { index });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event_type: &str, payload: serde_json::Value, exception: Option<&str>) -> EventStreamFrame {
        EventStreamFrame {
            event_type: Some(event_type.to_string()),
            exception_type: exception.map(str::to_string),
            payload: serde_json::to_vec(&payload).unwrap().into(),
        }
    }

    #[test]
    fn assistant_response_event_emits_text_delta() {
        let mut state = KiroToClaudeStreamState::new("msg_1".to_string(), "kiro".to_string());
        let events = state.transform_frame(frame(
            "assistantResponseEvent",
            serde_json::json!({"assistantResponseEvent": {"content": "hi"}}),
            None,
        ));
        assert!(matches!(events[0], StreamEvent::MessageStart { .. }));
        assert!(matches!(events[1], StreamEvent::ContentBlockStart { .. }));
        assert!(matches!(events[2], StreamEvent::ContentBlockDelta { .. }));
    }

    #[test]
    fn content_length_exceeded_short_circuits_with_max_tokens() {
        let mut state = KiroToClaudeStreamState::new("msg_1".to_string(), "kiro".to_string());
        state.transform_frame(frame(
            "assistantResponseEvent",
            serde_json::json!({"content": "partial"}),
            None,
        ));
        let events = state.transform_frame(frame(
            "exception",
            serde_json::json!({}),
            Some("ContentLengthExceededException"),
        ));
        assert!(state.is_terminated());
        let delta = events.iter().find_map(|e| match e {
            StreamEvent::MessageDelta { delta, .. } => Some(delta.stop_reason),
            _ => None,
        });
        assert_eq!(delta, Some(Some(StopReason::MaxTokens)));
    }

    #[test]
    fn tool_use_event_opens_and_closes_on_stop() {
        let mut state = KiroToClaudeStreamState::new("msg_1".to_string(), "kiro".to_string());
        let events = state.transform_frame(frame(
            "toolUseEvent",
            serde_json::json!({"toolUseId": "t1", "name": "search", "input": {"q": "x"}, "stop": true}),
            None,
        ));
        assert!(events.iter().any(|e| matches!(e, StreamEvent::ContentBlockStart { .. })));
        assert!(events.iter().any(|e| matches!(e, StreamEvent::ContentBlockStop { .. })));
    }
}
