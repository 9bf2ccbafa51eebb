//! Incremental server-sent-event parsing.
//!
//! The parser is pull-based: feed it raw bytes as they arrive with
//! [`SseParser::push`], then drain complete events with
//! [`SseParser::next_event`], which returns `None` once more bytes are
//! needed. Nothing here touches the network, so framing behavior is testable
//! against hand-written byte sequences.
//!
//! Frames follow the `data: <payload>` convention terminated by a blank
//! line. Fragmentation at arbitrary byte boundaries (HTTP/2 frames don't
//! respect event boundaries) and CRLF line endings are both handled.

use memchr::memchr;

#[derive(Default)]
pub struct SseParser {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly-arrived body bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// The data payload of the next complete event, or `None` if the buffer
    /// doesn't hold one yet. Multiple `data:` lines in one event are joined
    /// with a newline. Events with no data (comments, keep-alives, unknown
    /// fields) are swallowed.
    pub fn next_event(&mut self) -> Option<String> {
        while let Some(newline) = memchr(b'\n', &self.buf) {
            let mut line_end = newline;
            if line_end > 0 && self.buf[line_end - 1] == b'\r' {
                line_end -= 1;
            }
            let line = String::from_utf8_lossy(&self.buf[..line_end]).into_owned();
            self.buf.drain(..=newline);

            if line.is_empty() {
                // Event boundary.
                if !self.data.is_empty() {
                    return Some(self.data.drain(..).collect::<Vec<_>>().join("\n"));
                }
                continue;
            }

            if let Some(payload) = line.strip_prefix("data:") {
                let payload = payload.strip_prefix(' ').unwrap_or(payload);
                if !payload.is_empty() {
                    self.data.push(payload.to_string());
                }
            }
            // Other fields (event:, id:, retry:) and comment lines are
            // irrelevant to the completion protocol.
        }
        None
    }
}
