use crate::buffer::{ZeroCopyBuffer, bytes_to_str};
use crate::token::UpstreamError;

const DONE_MARKER: &str = "[DONE]";

/// A complete Server-Sent Events frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A data event.
    Data {
        /// The event type, if the frame named one.
        event: Option<String>,
        /// Data lines joined with `\n`.
        data: String,
    },
    /// The `[DONE]` marker ending an OpenAI-style stream.
    Done,
}

#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    data: Option<String>,
}

/// Incremental SSE framer.
///
/// Bytes are pushed as they arrive from the network; frames are cut out of the
/// buffer in place once their terminating blank line has been seen. A frame
/// split across several pushes is assembled without re-scanning earlier bytes.
#[derive(Debug, Default)]
pub struct SseFramer {
    buffer: ZeroCopyBuffer,
    pending: PendingEvent,
    done: bool,
}

impl SseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes received from the network.
    pub fn push(&mut self, chunk: &[u8]) {
        if !self.done {
            self.buffer.write(chunk);
        }
    }

    /// Whether the `[DONE]` marker has been framed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Returns the next complete frame, or `None` until more bytes arrive.
    pub fn next_frame(&mut self) -> Result<Option<SseFrame>, UpstreamError> {
        while !self.done {
            let Some(newline) = self.buffer.bytes().iter().position(|&b| b == b'\n') else {
                self.reclaim();
                return Ok(None);
            };

            let raw = &self.buffer.bytes()[..newline];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

            let line =
                bytes_to_str(raw).map_err(|e| UpstreamError::Decode(format!("Invalid UTF-8 in SSE stream: {e}")))?;
            let frame = if line.is_empty() {
                dispatch(&mut self.pending)
            } else {
                apply_field(line, &mut self.pending);
                None
            };

            self.buffer
                .consume(newline + 1)
                .map_err(|e| UpstreamError::Decode(e.to_string()))?;

            if let Some(frame) = frame {
                if frame == SseFrame::Done {
                    self.done = true;
                    self.buffer.reset();
                }

                return Ok(Some(frame));
            }
        }

        Ok(None)
    }

    fn reclaim(&mut self) {
        if self.buffer.is_empty() {
            self.buffer.reset();
        } else {
            self.buffer.compact();
        }
    }
}

fn dispatch(pending: &mut PendingEvent) -> Option<SseFrame> {
    let PendingEvent { event, data } = std::mem::take(pending);
    let data = data?;

    if data.trim() == DONE_MARKER {
        return Some(SseFrame::Done);
    }

    Some(SseFrame::Data { event, data })
}

fn apply_field(line: &str, pending: &mut PendingEvent) {
    if line.starts_with(':') {
        return;
    }

    let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    };

    match field {
        "data" => match pending.data.as_mut() {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => pending.data = Some(value.to_string()),
        },
        "event" => pending.event = Some(value.to_string()),
        "id" | "retry" => {}
        _ => log::debug!("Ignoring unknown SSE field: {field}"),
    }
}
