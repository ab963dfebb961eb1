//! Server-Sent Events Decoder
//!
//! Incremental decoder for `text/event-stream` bodies. Chunks may split
//! lines and events at any byte; complete events are returned as soon as
//! their terminating blank line arrives.
//!
//! # Wire Format
//!
//! ```text
//! event: heartbeat
//! data: 1580428783
//!
//! data: {"batch":[...]}
//!
//! event: closing
//! data: closing
//!
//! ```

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// Concatenated `data:` lines, joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// Whether this is a gateway keep-alive.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.event.as_deref() == Some("heartbeat")
    }

    /// Whether the gateway announced it is closing the stream.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.event.as_deref() == Some("closing")
    }
}

/// Incremental event-stream decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id and retry carry nothing the receiver uses
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_complete_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"batch\":[]}\n\nevent: heartbeat\ndata: 1\n\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, None);
        assert_eq!(events[0].data, "{\"batch\":[]}");
        assert!(events[1].is_heartbeat());
        assert_eq!(events[1].data, "1");
    }

    #[test]
    fn events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: hel").is_empty());
        assert!(decoder.push(b"lo\n").is_empty());

        let events = decoder.push(b"\n");
        assert_eq!(events, vec![SseEvent {
            event: None,
            data: "hello".to_string(),
        }]);
    }

    #[test]
    fn crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: closing\r\ndata: closing\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert!(events[0].is_closing());
    }

    #[test]
    fn multiline_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn comments_and_empty_events_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\n\nevent: heartbeat\n\nid: 7\nretry: 10\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn event_type_resets_after_dispatch() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: heartbeat\ndata: 1\n\ndata: x\n\n");
        assert!(events[0].is_heartbeat());
        assert_eq!(events[1].event, None);
    }

    #[test]
    fn value_without_space_after_colon() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data:tight\n\n");
        assert_eq!(events[0].data, "tight");
    }
}
