//! Server-sent event framing shared by the HTTP providers

use bytes::{BufMut, BytesMut};

use crate::{Error, Result};

/// One complete `data:` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Data lines joined with `\n`
    pub data: String,
}

impl SseEvent {
    /// The `[DONE]` sentinel that closes OpenAI style streams
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Accumulates raw stream bytes and yields complete events.
///
/// Multi-byte UTF-8 characters split across network chunks are held back
/// until the rest of the character arrives. Lines may end in `\n` or `\r\n`.
#[derive(Debug)]
pub struct SseBuffer {
    pending: BytesMut,
    text: String,
    data: Vec<String>,
    max_capacity: usize,
}

impl Default for SseBuffer {
    fn default() -> Self {
        Self::with_capacity_limit(10 * 1024 * 1024)
    }
}

impl SseBuffer {
    /// Empty buffer with a 10MB limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty buffer with a custom limit
    pub fn with_capacity_limit(max_capacity: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            text: String::new(),
            data: Vec::new(),
            max_capacity,
        }
    }

    /// Bytes and text not yet consumed as events
    pub fn buffered_len(&self) -> usize {
        self.pending.len() + self.text.len()
    }

    /// Add a network chunk
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        if self.buffered_len() + chunk.len() > self.max_capacity {
            return Err(Error::StreamInterrupted(format!(
                "SSE buffer exceeded max capacity of {} bytes",
                self.max_capacity
            )));
        }
        self.pending.put_slice(chunk);

        match std::str::from_utf8(&self.pending) {
            Ok(decoded) => {
                self.text.push_str(decoded);
                self.pending.clear();
            }
            Err(e) if e.error_len().is_some() => {
                return Err(Error::StreamInterrupted(format!(
                    "Invalid UTF-8 in SSE stream: {}",
                    e
                )));
            }
            Err(e) => {
                // incomplete trailing character stays pending
                let valid = self.pending.split_to(e.valid_up_to());
                self.text.push_str(&String::from_utf8_lossy(&valid));
            }
        }
        Ok(())
    }

    /// Next complete event, if a blank line has been seen
    pub fn next_event(&mut self) -> Option<SseEvent> {
        while let Some(pos) = self.text.find('\n') {
            let raw: String = self.text.drain(..=pos).collect();
            let line = raw.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if self.data.is_empty() {
                    continue;
                }
                let data = std::mem::take(&mut self.data).join("\n");
                return Some(SseEvent { data });
            }
            if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // comments and other fields are ignored
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_utf8_is_held_back() {
        let mut buffer = SseBuffer::new();

        // "心" is [0xE5, 0xBF, 0x83]
        buffer.push(b"data: \xE5\xBF").expect("first half");
        assert_eq!(buffer.pending.len(), 2);
        assert!(buffer.next_event().is_none());

        buffer.push(b"\x83\n\n").expect("second half");
        assert_eq!(buffer.pending.len(), 0);
        assert_eq!(
            buffer.next_event(),
            Some(SseEvent { data: "心".to_string() })
        );
    }

    #[test]
    fn test_crlf_and_multiline_events() {
        let mut buffer = SseBuffer::new();
        buffer
            .push(b": keep-alive\r\n\r\ndata: one\r\ndata: two\r\n\r\ndata: [DONE]\n\n")
            .expect("push");

        let first = buffer.next_event().expect("first event");
        assert_eq!(first.data, "one\ntwo");
        assert!(!first.is_done());
        assert!(buffer.next_event().expect("sentinel").is_done());
        assert!(buffer.next_event().is_none());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut buffer = SseBuffer::new();
        buffer.push(b"data: {\"a\"").expect("push");
        assert!(buffer.next_event().is_none());
        buffer.push(b":1}\n").expect("push");
        assert!(buffer.next_event().is_none());
        buffer.push(b"\n").expect("push");
        assert_eq!(buffer.next_event().map(|e| e.data), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn test_overflow() {
        let mut buffer = SseBuffer::with_capacity_limit(10);
        assert!(buffer.push(&[b'x'; 11]).is_err());
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let mut buffer = SseBuffer::new();
        let err = buffer.push(&[0xFF, b'a']).expect_err("invalid byte");
        assert!(matches!(err, Error::StreamInterrupted(_)));
    }
}
