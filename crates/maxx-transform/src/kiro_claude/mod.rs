//! Kiro/CodeWhisperer AWS-EventStream → Claude SSE conversion (§4.4).

pub mod stream;
