use serde::{Deserialize, Serialize};

use super::types::{ChatCompletionStreamDelta, CompletionUsage, FinishReason};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionStreamChoice {
    pub index: u32,
    pub delta: ChatCompletionStreamDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// One `data: {...}` payload of an OpenAI chat-completions SSE stream,
/// terminated out-of-band by a literal `data: [DONE]` line (handled by the
/// caller, not represented as a variant here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatCompletionStreamResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<ChatCompletionStreamChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

pub const DONE_MARKER: &str = "[DONE]";
