use serde::{Deserialize, Serialize};

use super::types::{Content, FinishReason, UsageMetadata};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub index: u32,
}

/// Shared by both the buffered non-streaming response and each unwrapped
/// line of the streaming response (§4.5: the v1internal endpoint wraps each
/// streamed chunk as `{"response": {...}}`, unwrapped before reaching this
/// type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}
