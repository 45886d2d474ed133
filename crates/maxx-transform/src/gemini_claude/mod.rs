//! Gemini → Claude conversion (§4.4): non-streaming (fully buffered) and
//! streaming (re-framed line-by-line, unwrapping the `{response: {...}}`
//! envelope emitted by the v1internal endpoint — §4.5).

pub mod response;
pub mod stream;
