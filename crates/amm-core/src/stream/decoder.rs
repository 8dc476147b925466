//! Line-oriented decoder for the chat event stream.
//!
//! The server speaks a minimal subset of server-sent events:
//!
//! ```text
//! event: skill_start
//! data: {"skill_name": "work_order_lookup", ...}
//!
//! ```
//!
//! Decoding is purely line and prefix driven. Blank lines between frames are
//! tolerated but not required.

use serde_json::{Map, Value};

const EVENT_PREFIX: &str = "event: ";
const DATA_PREFIX: &str = "data: ";

/// One decoded `(event_type, data)` unit of the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event_type: String,
    pub data: Map<String, Value>,
}

impl Frame {
    pub fn new(event_type: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// Incremental decoder turning raw body chunks into [`Frame`]s.
///
/// Chunks may be split anywhere, including inside a multi-byte UTF-8
/// sequence: the buffer holds raw bytes and a line is only decoded once its
/// terminating `\n` has been received. The output for a given stream is the
/// same regardless of how it was chunked.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    pending_event: Option<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every frame completed by it, in order.
    pub fn push(&mut self, chunk: impl AsRef<[u8]>) -> Vec<Frame> {
        // Bytes already buffered contain no newline.
        let mut search_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk.as_ref());

        let mut frames = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let line_end = search_from + offset;
            let line = String::from_utf8_lossy(&self.buffer[line_start..line_end]).into_owned();
            if let Some(frame) = self.decode_line(&line) {
                frames.push(frame);
            }
            line_start = line_end + 1;
            search_from = line_start;
        }

        self.buffer.drain(..line_start);
        frames
    }

    /// Flushes a final line that was not newline-terminated.
    ///
    /// Call once the body has ended; the decoder is empty afterwards.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        let frame = if rest.is_empty() {
            None
        } else {
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.decode_line(&line)
        };
        self.pending_event = None;
        frame
    }

    fn decode_line(&mut self, line: &str) -> Option<Frame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(event_type) = line.strip_prefix(EVENT_PREFIX) {
            let event_type = event_type.trim();
            self.pending_event = (!event_type.is_empty()).then(|| event_type.to_string());
            return None;
        }

        let payload = line.strip_prefix(DATA_PREFIX)?;
        let event_type = self.pending_event.take()?;

        match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(data)) => Some(Frame { event_type, data }),
            Ok(other) => {
                tracing::debug!(
                    event_type = %event_type,
                    "Dropping frame with non-object payload: {}",
                    other
                );
                None
            }
            Err(err) => {
                tracing::debug!(
                    event_type = %event_type,
                    "Dropping frame with malformed payload: {}",
                    err
                );
                None
            }
        }
    }
}
