//! Incremental Server-Sent Events decoding.
//!
//! Bytes are fed in as they come off the wire; an event is emitted each time a
//! blank line closes it. Lines may be split anywhere across reads, including
//! inside a multi-byte UTF-8 sequence.
//!
//! ```text
//! data: {"id":"chatcmpl-1","choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"id":"chatcmpl-1","choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```

use crate::domain::StreamError;

/// Payload that marks the end of a completion stream
pub const DONE_MARKER: &str = "[DONE]";

/// Longest line accepted before the stream is rejected
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// A decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// The joined `data:` lines of one event
    Data(String),
    /// The `[DONE]` terminal marker
    Done,
}

/// Buffers partial lines across reads and assembles events
#[derive(Debug, Default)]
pub struct SseDecoder {
    line_buf: Vec<u8>,
    /// Bytes of `line_buf` already known to hold no newline
    scan_from: usize,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read's worth of bytes, returning every event it completed
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, StreamError> {
        self.scan_from = self.line_buf.len();
        self.line_buf.extend_from_slice(bytes);

        let mut events = Vec::new();

        while let Some(offset) = self.line_buf[self.scan_from..]
            .iter()
            .position(|&b| b == b'\n')
        {
            let newline_pos = self.scan_from + offset;
            let line: Vec<u8> = self.line_buf.drain(..=newline_pos).collect();
            self.scan_from = 0;

            let line = decode_line(&line[..line.len() - 1])?;

            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        if self.line_buf.len() > MAX_LINE_BYTES {
            return Err(StreamError::protocol(format!(
                "event stream line exceeds {} bytes",
                MAX_LINE_BYTES
            )));
        }

        Ok(events)
    }

    /// Flush whatever the body left without a closing blank line
    pub fn finish(&mut self) -> Result<Option<SseEvent>, StreamError> {
        if !self.line_buf.is_empty() {
            let line = std::mem::take(&mut self.line_buf);
            self.scan_from = 0;
            let line = decode_line(&line)?;

            if let Some(event) = self.process_line(line) {
                return Ok(Some(event));
            }
        }

        Ok(self.dispatch())
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        // event, id and retry carry nothing a completion consumer needs
        if field == "data" {
            self.data_lines.push(value.to_string());
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            return None;
        }

        let data = self.data_lines.join("\n");
        self.data_lines.clear();

        if data.trim() == DONE_MARKER {
            Some(SseEvent::Done)
        } else {
            Some(SseEvent::Data(data))
        }
    }
}

fn decode_line(line: &[u8]) -> Result<&str, StreamError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    std::str::from_utf8(line)
        .map_err(|e| StreamError::protocol(format!("event stream is not valid UTF-8: {}", e)))
}
