//! Wire DTOs for the four client dialects the dispatch engine understands,
//! plus the generic SSE line-framer and the AWS EventStream binary framer.
//!
//! Layout mirrors `maxx-protocol`'s per-dialect module split
//! (`claude`, `openai`, `gemini`), trimmed to the single operation this core
//! spec names per dialect (message/chat/content creation, streaming
//! included) rather than the teacher's full REST surface (count_tokens,
//! list_models, OpenAI Responses CRUD, ...).

pub mod aws_eventstream;
pub mod claude;
pub mod gemini;
pub mod openai;
pub mod sse;
