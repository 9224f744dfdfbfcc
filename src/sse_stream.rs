//! Stream adapter for parsing server-sent events out of an HTTP byte stream.
//!
//! The Bedrock response stream arrives as discrete events separated by blank
//! lines. Events may be split across network chunks, so the adapter buffers
//! raw bytes and only yields fully delimited events.

use crate::Error;
use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Upper bound on buffered bytes for a single unterminated event.
const MAX_EVENT_BUFFER: usize = 1_000_000;

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if present.
    pub event_type: Option<String>,
    /// Joined `data:` lines.
    pub data: String,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event_type: None,
            data: data.into(),
        }
    }

    pub fn with_type(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            data: data.into(),
        }
    }
}

/// Parses SSE events from an underlying byte stream, holding partial event
/// bytes between polls.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
    parsed: VecDeque<SseEvent>,
}

impl<S> SseStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            parsed: VecDeque::new(),
        }
    }

    /// Split complete events off the front of the buffer and queue them.
    fn drain_complete_events(&mut self) -> Result<(), Error> {
        let separator = b"\n\n";
        let finder = memmem::Finder::new(separator);
        let mut consumed = 0;

        while let Some(pos) = finder.find(&self.buffer[consumed..]) {
            let end = consumed + pos;
            let text = std::str::from_utf8(&self.buffer[consumed..end])
                .map_err(|e| Error::streaming(format!("invalid UTF-8 in event stream: {e}")))?;

            if let Some(event) = parse_event(text) {
                self.parsed.push_back(event);
            }
            consumed = end + separator.len();
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        Ok(())
    }
}

/// Parse the text of one delimited event. Returns `None` when the block
/// carries no data lines (comments, keep-alives).
fn parse_event(text: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data_lines = Vec::new();

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        if let Some((field, mut value)) = line.split_once(':') {
            if let Some(stripped) = value.strip_prefix(' ') {
                value = stripped;
            }
            match field {
                "event" => event_type = Some(value.to_string()),
                "data" => data_lines.push(value.to_string()),
                _ => {}
            }
        }
    }

    if data_lines.is_empty() && event_type.is_none() {
        return None;
    }

    Some(SseEvent {
        event_type,
        data: data_lines.join("\n"),
    })
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.parsed.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "transport stream failed: {}",
                        e.into()
                    )))));
                }
                None => {
                    // The provider may close without a trailing blank line;
                    // flush whatever complete event remains in the buffer.
                    if !self.buffer.is_empty() {
                        let leftover = std::mem::take(&mut self.buffer);
                        if let Ok(text) = std::str::from_utf8(&leftover) {
                            if let Some(event) = parse_event(text.trim_end()) {
                                return Poll::Ready(Some(Ok(event)));
                            }
                        }
                    }
                    return Poll::Ready(None);
                }
            };

            self.buffer.extend_from_slice(&chunk);

            if self.buffer.len() > MAX_EVENT_BUFFER {
                self.buffer.clear();
                return Poll::Ready(Some(Err(Error::streaming(
                    "event exceeded maximum buffer size",
                ))));
            }

            if let Err(e) = self.drain_complete_events() {
                return Poll::Ready(Some(Err(e)));
            }
        }
    }
}
