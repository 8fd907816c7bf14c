use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;

use cadence_core::error::{CadenceError, Result};

/// Incremental parser for `text/event-stream` bodies.
///
/// Events are separated by a blank line; only `event:` and `data:` fields
/// are kept. CRLF line endings are normalised before splitting.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
}

/// A parsed SSE event.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and drain every complete event it finishes.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();

            let mut event_type = None;
            let mut data_lines = Vec::new();

            for line in block.lines() {
                if let Some(val) = line.strip_prefix("event:") {
                    event_type = Some(val.trim_start().to_string());
                } else if let Some(val) = line.strip_prefix("data:") {
                    data_lines.push(val.strip_prefix(' ').unwrap_or(val).to_string());
                }
            }

            if !data_lines.is_empty() {
                events.push(SseEvent {
                    event_type,
                    data: data_lines.join("\n"),
                });
            }
        }

        events
    }
}

/// Adapts a byte stream from `reqwest` into a stream of SSE events.
///
/// Bytes of a character split across chunks are held back until the rest
/// arrives. A transport error is yielded once as `LlmStream` and ends the
/// stream.
pub struct SseStream<S> {
    inner: S,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    carry: Vec<u8>,
    done: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            carry: Vec::new(),
            done: false,
        }
    }

    /// Decode as much of the carried bytes as forms complete characters.
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        match std::str::from_utf8(&self.carry) {
            Ok(text) => {
                let text = text.to_string();
                self.carry.clear();
                text
            }
            // incomplete trailing character: keep it for the next chunk
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.carry[..valid]).into_owned();
                self.carry.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.carry).into_owned();
                self.carry.clear();
                text
            }
        }
    }
}

impl<S, B, E> Stream for SseStream<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let text = this.decode(bytes.as_ref());
                    let events = this.parser.feed(&text);
                    this.pending.extend(events);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(CadenceError::LlmStream(e.to_string()))));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_sse_parser_data_only() {
        let mut parser = SseParser::new();
        let events = parser.feed("data: {\"choices\":[]}\n\n");
        assert_eq!(events.len(), 1);
        assert!(events[0].event_type.is_none());
        assert_eq!(events[0].data, "{\"choices\":[]}");
    }

    #[test]
    fn test_sse_parser_crlf_and_chunking() {
        let mut parser = SseParser::new();
        assert!(parser.feed("data: {\"x\":").is_empty());
        let events = parser.feed("1}\r\n\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"x\":1}");
        assert_eq!(events[1].data, "[DONE]");
    }

    async fn collect(chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>>) -> Vec<Result<SseEvent>> {
        SseStream::new(futures::stream::iter(chunks)).collect().await
    }

    #[tokio::test]
    async fn test_sse_stream_joins_split_character() {
        let body = "data: {\"t\":\"café\"}\n\n".as_bytes();
        // split inside the two-byte 'é'
        let cut = body.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let events = collect(vec![Ok(body[..cut].to_vec()), Ok(body[cut..].to_vec())]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().data, "{\"t\":\"café\"}");
    }

    #[tokio::test]
    async fn test_sse_stream_surfaces_transport_error() {
        let events = collect(vec![
            Ok(b"data: first\n\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(b"data: never\n\n".to_vec()),
        ])
        .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().data, "first");
        assert!(matches!(&events[1], Err(CadenceError::LlmStream(m)) if m == "reset"));
    }

    #[test]
    fn test_sse_parser_ignores_comments() {
        let mut parser = SseParser::new();
        let events = parser.feed(": keep-alive\n\nevent: done\ndata:[DONE]\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("done"));
        assert_eq!(events[0].data, "[DONE]");
    }
}
