//! Server-sent event decoding.
//!
//! Only `data: ` records matter to chat-completion streams. Every other line
//! (comments, `event:`, blank separators) is skipped, and a `[DONE]` record
//! ends the stream even if the connection stays open.

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::error::ConvertError;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseRecord {
    Data(String),
    Done,
}

/// Parse an SSE line, returning `None` for lines that are not data records.
pub fn parse_sse_line(line: &str) -> Option<SseRecord> {
    let data = line.strip_prefix(DATA_PREFIX)?.trim();
    if data == DONE_SENTINEL {
        return Some(SseRecord::Done);
    }
    Some(SseRecord::Data(data.to_string()))
}

/// Incremental line decoder.
///
/// Bytes are buffered until a newline arrives, so records (and UTF-8
/// sequences) split across reads are reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one chunk, returning every record completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseRecord> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            match parse_sse_line(&line) {
                Some(SseRecord::Done) => {
                    self.finished = true;
                    self.buffer.clear();
                    records.push(SseRecord::Done);
                    break;
                }
                Some(record) => records.push(record),
                None => {}
            }
        }
        records
    }

    /// Flush a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<SseRecord> {
        if self.finished || self.buffer.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.finished = true;
        parse_sse_line(&line)
    }
}

/// Turn a byte stream into a stream of `data:` payloads, ending at `[DONE]`.
pub fn sse_data_stream<S, B, E>(bytes: S) -> BoxStream<'static, Result<String, ConvertError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ConvertError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut decoder = SseDecoder::new();
        futures::pin_mut!(bytes);

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(e.into());
                    break;
                }
            };
            for record in decoder.push(chunk.as_ref()) {
                if let SseRecord::Data(data) = record {
                    yield Ok(data);
                }
            }
            if decoder.is_finished() {
                break;
            }
        }

        if let Some(SseRecord::Data(data)) = decoder.finish() {
            yield Ok(data);
        }
    };
    Box::pin(stream)
}
