//! Claude ↔ OpenAI chat-completions conversion (§4.4): request, response
//! and stream conversion all run in both directions, covering a Custom
//! provider whose native dialect is OpenAI serving a Claude client, and one
//! whose native dialect is Claude serving an OpenAI client (§8 scenario
//! S2).

pub mod request;
pub mod response;
pub mod stream;
