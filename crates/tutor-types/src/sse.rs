//! Incremental decoder for `text/event-stream` bodies.
//!
//! Network reads split the body at arbitrary byte offsets, including inside a
//! line or inside a multi-byte UTF-8 sequence.  [`SseDecoder`] buffers bytes
//! until a full line is available, so callers can feed raw chunks as they
//! arrive.  Lines end in `\n` or `\r\n`.
//!
//! Only `data` fields are interpreted.  Multiple `data:` lines in one event
//! are joined with `\n`, which is how a fragment containing newlines travels.

/// Payload of the terminal event of a successful solve stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A text fragment produced by the model.
    Data(String),
    /// The `[DONE]` sentinel; no further frames follow.
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: String,
    has_data: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `chunk` and return every event completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        // A `\n` byte never occurs inside a multi-byte UTF-8 sequence, so
        // splitting on it before decoding is safe.
        while let Some(offset) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let mut line = &self.buf[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.buf.drain(..start);
        frames
    }

    /// `true` if bytes or an undispatched event are buffered.
    ///
    /// A stream that ends in this state was cut off mid-event.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty() || self.has_data
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
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
        if field == "data" {
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(value);
            self.has_data = true;
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        let data = std::mem::take(&mut self.data);
        if data == DONE_SENTINEL {
            Some(SseFrame::Done)
        } else {
            Some(SseFrame::Data(data))
        }
    }
}
