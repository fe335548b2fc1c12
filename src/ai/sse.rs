//! Server-Sent Events (SSE) parser for chat-completions streaming responses.
//!
//! This module provides a pull-based line scanner that handles:
//! - Lines split across network reads
//! - Multiple lines in one read
//! - Comments, `event:` lines and heartbeats (safely ignored)
//!
//! Every `data:` line carries either the `[DONE]` sentinel or a JSON chunk
//! shaped as `{choices: [{delta: {content?: string}}]}`.

use serde::Deserialize;
use thiserror::Error;

const DONE_SENTINEL: &str = "[DONE]";

/// A single decoded delta from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Content fragment of the first choice (may be empty).
    Content(String),
    /// The server signalled the end of the stream.
    Done,
}

/// A `data:` line whose payload did not decode as a completion chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed SSE frame ({reason}): {line}")]
pub struct MalformedFrame {
    pub line: String,
    pub reason: String,
}

/// Result of parsing one SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Chunk(StreamChunk),
    Malformed(MalformedFrame),
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Stateful SSE parser that buffers an incomplete trailing line across chunks.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    finished: bool,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of text and returns the results of every complete line.
    ///
    /// Nothing after the `[DONE]` sentinel is parsed; once it has been seen the
    /// parser stays finished and further input is discarded.
    pub fn feed(&mut self, chunk: &str) -> Vec<ParseResult> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.push_str(chunk);

        let mut results = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(result) = Self::parse_line(&line) {
                let done = result == ParseResult::Chunk(StreamChunk::Done);
                results.push(result);
                if done {
                    self.finished = true;
                    self.buffer.clear();
                    break;
                }
            }
        }

        results
    }

    /// Parses whatever is left in the buffer as a final, unterminated line.
    pub fn finish(&mut self) -> Option<ParseResult> {
        if self.finished {
            return None;
        }
        self.finished = true;
        let line = std::mem::take(&mut self.buffer);
        Self::parse_line(&line)
    }

    fn parse_line(raw: &str) -> Option<ParseResult> {
        let line = raw.trim();

        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        if line == DONE_SENTINEL {
            return Some(ParseResult::Chunk(StreamChunk::Done));
        }

        let data = line.strip_prefix("data:")?.trim_start();
        if data == DONE_SENTINEL {
            return Some(ParseResult::Chunk(StreamChunk::Done));
        }

        match serde_json::from_str::<CompletionChunk>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .map(|content| ParseResult::Chunk(StreamChunk::Content(content))),
            Err(e) => Some(ParseResult::Malformed(MalformedFrame {
                line: line.to_string(),
                reason: e.to_string(),
            })),
        }
    }

    /// Returns any remaining buffered data (for debugging/testing).
    #[must_use]
    pub fn remaining_buffer(&self) -> &str {
        &self.buffer
    }

    /// Returns `true` once the `[DONE]` sentinel was seen or `finish` was called.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}
