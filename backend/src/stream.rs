//! Turns provider output into one uniform stream of text chunks.
//!
//! Providers either hand back a live byte stream or a single JSON completion.
//! Both end up as a [`TextChunkStream`]: a read error on the transport is the
//! last item of the stream, and whatever was emitted before it stays emitted.
//! Dropping the stream drops the upstream body, which aborts the request.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        StreamError::Transport(e.to_string())
    }
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;
pub type TextChunkStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionObject {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: Option<CompletionMessage>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionObject {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![CompletionChoice {
                message: Some(CompletionMessage {
                    content: Some(text.into()),
                }),
            }],
        }
    }

    /// Content of the first choice, empty when the provider sent none.
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .unwrap_or_default()
    }
}

/// What a provider returns for one completion request.
pub enum CompletionResult {
    Streaming(ByteStream),
    Single(CompletionObject),
}

impl std::fmt::Debug for CompletionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionResult::Streaming(_) => f.write_str("Streaming(..)"),
            CompletionResult::Single(obj) => f.debug_tuple("Single").field(obj).finish(),
        }
    }
}

pub fn adapt_to_text_stream(result: CompletionResult) -> TextChunkStream {
    match result {
        CompletionResult::Streaming(mut bytes) => Box::pin(async_stream::stream! {
            let mut decoder = Utf8ChunkDecoder::default();
            while let Some(next) = bytes.next().await {
                match next {
                    Ok(chunk) => {
                        let text = decoder.decode(&chunk);
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Stream read error: {}", e);
                        yield Err(e);
                        return;
                    }
                }
            }
            let rest = decoder.finish();
            if !rest.is_empty() {
                yield Ok(rest);
            }
        }),
        CompletionResult::Single(completion) => {
            Box::pin(futures::stream::once(async move { Ok(completion.text()) }))
        }
    }
}

/// Incremental UTF-8 decoder that carries split code points over to the next chunk.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end; wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
