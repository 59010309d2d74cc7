//! Server-Sent Events encoding and decoding (spec §4.2).
//!
//! Pure, no-I/O: `encode` turns one [`SseEvent`] into wire bytes, and
//! [`SseDecoder`] is a small state machine callers feed bytes into as they
//! arrive, getting back whichever events that chunk completed.

/// One Server-Sent Event.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// `id:` field, used as the resumption cursor via `Last-Event-ID`.
    pub id: Option<String>,
    /// `event:` field; absent means the implicit type `"message"`.
    pub event: Option<String>,
    /// `data:` payload. May itself contain embedded newlines, each of which
    /// becomes its own `data:` line on the wire.
    pub data: String,
    /// `retry:` field, the reconnection delay in milliseconds a client
    /// should honor.
    pub retry: Option<u32>,
}

impl SseEvent {
    /// An event carrying only `data`.
    #[must_use]
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// An event carrying a resumption `id` and `data`.
    #[must_use]
    pub fn with_id(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            data: data.into(),
            ..Self::default()
        }
    }
}

/// Encodes `event` to its wire representation: optional `id:`/`event:`/
/// `retry:` lines, one or more `data:` lines, then a blank line terminator.
#[must_use]
pub fn encode(event: &SseEvent) -> String {
    let mut out = String::new();
    if let Some(id) = &event.id {
        out.push_str("id: ");
        out.push_str(id);
        out.push('\n');
    }
    if let Some(event_type) = &event.event {
        out.push_str("event: ");
        out.push_str(event_type);
        out.push('\n');
    }
    if let Some(retry) = event.retry {
        out.push_str("retry: ");
        out.push_str(&retry.to_string());
        out.push('\n');
    }
    for line in event.data.lines() {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    if event.data.is_empty() {
        out.push_str("data: \n");
    }
    out.push('\n');
    out
}

/// Encodes a comment line (`: ...`), used for keepalive pings. Comments are
/// ignored by conforming SSE clients but reset any read-timeout they apply.
#[must_use]
pub fn encode_comment(comment: &str) -> String {
    let mut out = String::new();
    for line in comment.lines() {
        out.push_str(": ");
        out.push_str(line);
        out.push('\n');
    }
    if comment.is_empty() {
        out.push_str(":\n");
    }
    out.push('\n');
    out
}

/// An empty comment, the minimal keepalive ping.
#[must_use]
pub fn encode_keepalive() -> String {
    ":\n\n".to_string()
}

/// Default ceiling on a decoder's unterminated line buffer (spec §4.2: "a
/// token size ceiling (default 1 MiB) bounds memory").
pub const DEFAULT_MAX_TOKEN_BYTES: usize = 1024 * 1024;

/// Incremental SSE parser. Feed it bytes as they arrive over the wire; it
/// returns whichever events became complete (terminated by a blank line)
/// as a result of that feed.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: String,
    id: Option<String>,
    event: Option<String>,
    data: Vec<String>,
    retry: Option<u32>,
    max_token_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    /// A fresh decoder with no buffered partial event, capped at
    /// [`DEFAULT_MAX_TOKEN_BYTES`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_token_bytes(DEFAULT_MAX_TOKEN_BYTES)
    }

    /// A fresh decoder whose unterminated-line buffer is capped at
    /// `max_token_bytes` rather than the default.
    #[must_use]
    pub fn with_max_token_bytes(max_token_bytes: usize) -> Self {
        Self {
            buffer: String::new(),
            id: None,
            event: None,
            data: Vec::new(),
            retry: None,
            max_token_bytes,
        }
    }

    /// Feeds `chunk` (assumed UTF-8; non-UTF-8 input is dropped rather than
    /// erroring, matching SSE's liberal-client convention) and returns the
    /// events newly completed. If an unterminated line ever grows past this
    /// decoder's token cap, the partial line is dropped and decoding resumes
    /// at the next line boundary, bounding memory against a peer that never
    /// sends a newline.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let Ok(text) = std::str::from_utf8(chunk) else {
            return Vec::new();
        };
        self.buffer.push_str(text);

        let mut events = Vec::new();
        loop {
            match self.buffer.find('\n') {
                Some(pos) => {
                    let line = self.buffer[..pos].to_string();
                    self.buffer.drain(..=pos);
                    self.handle_line(&line, &mut events);
                }
                None => {
                    if self.buffer.len() > self.max_token_bytes {
                        tracing::warn!(
                            cap = self.max_token_bytes,
                            "SSE line exceeded token size ceiling, dropping buffered partial line"
                        );
                        self.buffer.clear();
                    }
                    break;
                }
            }
        }
        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            if let Some(event) = self.emit() {
                events.push(event);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.find(':') {
            Some(colon) => (&line[..colon], line[colon + 1..].strip_prefix(' ').unwrap_or(&line[colon + 1..])),
            None => (line, ""),
        };
        match field {
            "id" => self.id = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn emit(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() && self.id.is_none() && self.event.is_none() && self.retry.is_none() {
            return None;
        }
        let event = SseEvent {
            id: self.id.take(),
            event: self.event.take(),
            data: self.data.join("\n"),
            retry: self.retry.take(),
        };
        self.data.clear();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_simple_message() {
        assert_eq!(encode(&SseEvent::message("hello")), "data: hello\n\n");
    }

    #[test]
    fn encode_with_id_and_event_type() {
        let event = SseEvent {
            id: Some("s1_3".into()),
            event: Some("message".into()),
            data: "{\"a\":1}".into(),
            retry: None,
        };
        assert_eq!(encode(&event), "id: s1_3\nevent: message\ndata: {\"a\":1}\n\n");
    }

    #[test]
    fn encode_multiline_data_as_several_data_lines() {
        let event = SseEvent::message("line1\nline2");
        assert_eq!(encode(&event), "data: line1\ndata: line2\n\n");
    }

    #[test]
    fn decode_round_trips_encode() {
        let event = SseEvent::with_id("abc_1", "hello\nworld");
        let wire = encode(&event);
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(wire.as_bytes());
        assert_eq!(events, vec![event]);
    }

    #[test]
    fn decode_handles_byte_at_a_time_feeding() {
        let event = SseEvent::with_id("x_1", "payload");
        let wire = encode(&event);
        let mut decoder = SseDecoder::new();
        let mut collected = Vec::new();
        for byte in wire.as_bytes() {
            collected.extend(decoder.feed(&[*byte]));
        }
        assert_eq!(collected, vec![event]);
    }

    #[test]
    fn comment_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let mut input = encode_comment("keepalive");
        input.push_str(&encode(&SseEvent::message("real")));
        let events = decoder.feed(input.as_bytes());
        assert_eq!(events, vec![SseEvent::message("real")]);
    }

    #[test]
    fn keepalive_is_a_bare_comment() {
        assert_eq!(encode_keepalive(), ":\n\n");
    }
}
