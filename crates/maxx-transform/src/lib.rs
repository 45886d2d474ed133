//! The Dialect Converter (component 3 of the dispatch engine): bidirectional
//! non-streaming and streaming conversion between the wire dialects the
//! proxy actually has to bridge.
//!
//! Scoped to exactly the conversions the component design names: Claude ↔
//! OpenAI chat-completions request shaping, OpenAI → Claude streaming,
//! Gemini → Claude non-streaming and streaming, Kiro/CodeWhisperer
//! AWS-EventStream → Claude SSE, and the Claude-upstream request-body
//! shaping rules (betas, tool_choice/thinking, Claude-Code impersonation).
//! Mirrors `maxx-transform`'s per-dialect-pair module split, trimmed from
//! its full N-dialect matrix (count_tokens, list_models, get_model,
//! stream2nostream, and every dialect pair this design never names) down to
//! the flows above.

pub mod claude_gemini;
pub mod claude_openai;
pub mod claude_upstream;
pub mod gemini_claude;
pub mod kiro_claude;
pub mod state;

pub use state::{CommitTracker, TransformState};
