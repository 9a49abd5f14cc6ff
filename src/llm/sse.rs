//! Server-sent events decoding.
//!
//! Turns a raw `reqwest` byte stream into the payloads of its `data:` lines. Bytes
//! are buffered until a full line is available, so chunk boundaries inside a
//! multi-byte character are harmless.

use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::BackendError;

pub struct SseDataStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDataStream {
    pub fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: Vec::new(),
            finished: false,
        }
    }
}

impl Stream for SseDataStream {
    type Item = Result<String, BackendError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(data) = next_data_line(&mut this.buffer, this.finished) {
                return Poll::Ready(Some(data));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(BackendError::Network(e.to_string()))));
                }
                Poll::Ready(None) => this.finished = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// Pops lines until one is a `data:` line. At end of input the unterminated tail
// counts as a line.
fn next_data_line(buffer: &mut Vec<u8>, at_end: bool) -> Option<Result<String, BackendError>> {
    loop {
        let line: Vec<u8> = match buffer.iter().position(|b| *b == b'\n') {
            Some(pos) => buffer.drain(..=pos).collect(),
            None if at_end && !buffer.is_empty() => std::mem::take(buffer),
            None => return None,
        };

        let line = match String::from_utf8(line) {
            Ok(line) => line,
            Err(e) => {
                return Some(Err(BackendError::Parse(format!(
                    "Invalid UTF-8 in stream: {}",
                    e
                ))));
            }
        };
        let line = line.trim();

        // Blank lines separate events; event:/id:/retry: carry nothing we need
        if let Some(data) = line.strip_prefix("data:") {
            return Some(Ok(data.trim_start().to_string()));
        }
    }
}
