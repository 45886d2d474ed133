use bytes::Bytes;

/// A single parsed `event: .. / data: ..` SSE frame.
#[derive(Debug, Clone, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental parser that only emits events on blank-line (`\n\n`)
/// boundaries; a trailing partial line is retained in `buffer` until the
/// next push, and `finish()` flushes whatever is left at EOF (§4.4 rule 1:
/// non-SSE frame normalisation).
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &Bytes) -> Vec<SseEvent> {
        match std::str::from_utf8(chunk) {
            Ok(text) => self.push_str(text),
            Err(_) => Vec::new(),
        }
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let mut line = self.buffer[..pos].to_string();
            self.buffer.drain(..=pos);

            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                self.finish_event(&mut events);
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            if let Some(value) = line.strip_prefix("event:") {
                let value = value.trim_start();
                self.event = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
                continue;
            }
            if line == "event" {
                self.event = None;
                continue;
            }

            if let Some(value) = line.strip_prefix("data:") {
                let value = value.trim_start();
                self.data_lines.push(value.to_string());
                continue;
            }
            if line == "data" {
                self.data_lines.push(String::new());
                continue;
            }
        }

        events
    }

    /// Flush any buffered (necessarily incomplete) trailing line at EOF.
    /// Per §4.4 rule 1, a final incomplete line that never saw its
    /// terminating newline is discarded rather than guessed at.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        self.buffer.clear();
        self.finish_event(&mut events);
        events
    }

    fn finish_event(&mut self, events: &mut Vec<SseEvent>) {
        if self.event.is_none() && self.data_lines.is_empty() {
            return;
        }
        let data = self.data_lines.join("\n");
        events.push(SseEvent {
            event: self.event.take(),
            data,
        });
        self.data_lines.clear();
    }
}

/// Render one SSE frame. Every chunk produced by the converter must end
/// with exactly one `\n\n` and contain no partial line (§8 invariant 3).
pub fn encode_event(event: &str, data: &str) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_line() {
        let mut p = SseParser::new();
        let events = p.push_str("event: message_start\ndata: {\"a\":1}\n\nevent: ping\ndata: {}\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event.as_deref(), Some("message_start"));
        assert_eq!(events[0].data, "{\"a\":1}");
        assert_eq!(events[1].event.as_deref(), Some("ping"));
    }

    #[test]
    fn buffers_partial_line_across_pushes() {
        let mut p = SseParser::new();
        assert!(p.push_str("event: ping\ndata: {\"x").is_empty());
        let events = p.push_str("\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"x\":1}");
    }

    #[test]
    fn discards_incomplete_trailing_line_at_eof() {
        let mut p = SseParser::new();
        p.push_str("event: ping\ndata: {}\n\nevent: partial");
        let events = p.finish();
        assert!(events.is_empty());
    }

    #[test]
    fn encoded_event_ends_with_exactly_one_blank_line() {
        let s = encode_event("ping", "{}");
        assert!(s.ends_with("\n\n"));
        assert!(!s.ends_with("\n\n\n"));
    }
}
