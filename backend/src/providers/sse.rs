//! Extracts content deltas from OpenAI-style `text/event-stream` bodies.

use crate::stream::{ByteStream, StreamError};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Line-buffered parser; frames may be split across network chunks.
#[derive(Debug, Default)]
pub struct SseDeltaParser {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDeltaParser {
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut deltas = Vec::new();
        while !self.done {
            let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(delta) = self.process_line(&line) {
                deltas.push(delta);
            }
        }
        deltas
    }

    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        if self.done || line.is_empty() {
            return None;
        }
        self.process_line(&line)
    }

    fn process_line(&mut self, line: &[u8]) -> Option<String> {
        let line = match std::str::from_utf8(line) {
            Ok(l) => l.trim_end_matches(['\r', '\n']),
            Err(e) => {
                tracing::warn!("Skipping non UTF-8 event line: {}", e);
                return None;
            }
        };
        let data = line.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            self.done = true;
            return None;
        }
        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .filter(|c| !c.is_empty()),
            Err(e) => {
                tracing::warn!("Failed to parse stream chunk: {}", e);
                None
            }
        }
    }
}

/// Re-emits the content deltas of an event stream as raw text bytes.
pub fn delta_byte_stream<S, E>(body: S) -> ByteStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<StreamError> + Send + 'static,
{
    let mut body = Box::pin(body);
    Box::pin(async_stream::stream! {
        let mut parser = SseDeltaParser::default();
        while let Some(next) = body.next().await {
            match next {
                Ok(chunk) => {
                    for delta in parser.feed(&chunk) {
                        yield Ok(Bytes::from(delta));
                    }
                    if parser.is_done() {
                        return;
                    }
                }
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }
        }
        if let Some(delta) = parser.finish() {
            yield Ok(Bytes::from(delta));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_split_across_chunks() {
        let mut parser = SseDeltaParser::default();
        let mut out = parser.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choi");
        out.extend(parser.feed(b"ces\":[{\"delta\":{\"content\":\"lo\"}}]}\r\n\r\n"));
        assert_eq!(out, vec!["Hel", "lo"]);
    }

    #[test]
    fn done_marker_stops_parsing() {
        let mut parser = SseDeltaParser::default();
        let out = parser.feed(
            b": keep-alive\n\
              data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\
              data: [DONE]\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        );
        assert_eq!(out, vec!["Hi"]);
        assert!(parser.is_done());
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn malformed_frames_are_skipped() {
        let mut parser = SseDeltaParser::default();
        let out = parser.feed(b"data: {not json}\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}");
        assert!(out.is_empty());
        assert_eq!(parser.finish().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn byte_stream_forwards_deltas() {
        let body = futures::stream::iter(vec![
            Ok::<_, StreamError>(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
            )),
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\ndata: [DONE]\n\n",
            )),
        ]);
        let out: Vec<_> = delta_byte_stream(body).collect().await;
        assert_eq!(
            out,
            vec![Ok(Bytes::from_static(b"A")), Ok(Bytes::from_static(b"B"))]
        );
    }
}
