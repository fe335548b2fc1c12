//! Chat-completions streaming client.
//!
//! Owns the HTTP request lifecycle: request construction, status handling and
//! the incremental decoding of the SSE body into content fragments.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::prompt_builder::Conversation;
use super::sse::{ParseResult, SseParser, StreamChunk};
use crate::core::config::ClientConfig;
use crate::errors::PlannerError;

/// Streaming client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct CompletionStreamClient {
    http: Client,
    config: ClientConfig,
}

impl CompletionStreamClient {
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, PlannerError> {
        // No overall timeout: it would also cut off a long-running body stream.
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| PlannerError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn request_body(&self, conversation: &Conversation) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "stream": true,
            "messages": conversation,
        });
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    fn headers(&self) -> Result<HeaderMap, PlannerError> {
        let mut headers = HeaderMap::new();
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| PlannerError::Config(format!("Invalid Authorization header: {e}")))?;
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        Ok(headers)
    }

    /// Sends the request and returns the body stream once the server accepted it.
    ///
    /// # Errors
    ///
    /// - `Connection` if the request cannot be sent or no response arrives
    ///   within `request_timeout`.
    /// - `Server` for any non-2xx status, carrying the full body as text.
    pub async fn open_stream(
        &self,
        conversation: &Conversation,
    ) -> Result<CompletionStream, PlannerError> {
        #[cfg(feature = "debug-logs")]
        info!("Using itinerary prompt:\n{:?}", conversation);

        #[cfg(not(feature = "debug-logs"))]
        info!(
            model = %self.config.model,
            endpoint = %self.config.endpoint,
            "Opening completion stream"
        );

        let request = self
            .http
            .post(self.config.endpoint.clone())
            .headers(self.headers()?)
            .json(&self.request_body(conversation));

        let response = tokio::time::timeout(self.config.request_timeout, request.send())
            .await
            .map_err(|_| {
                PlannerError::Connection(format!(
                    "no response within {:?}",
                    self.config.request_timeout
                ))
            })?
            .map_err(|e| PlannerError::Connection(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read error response body: {e}>"));
            warn!(status = status.as_u16(), "Completion API refused the request");
            return Err(PlannerError::Server {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "Completion stream accepted");
        Ok(CompletionStream::from_byte_stream(
            Box::pin(response.bytes_stream()),
            self.config.lenient_eof,
        ))
    }
}

/// Type alias for the boxed byte stream.
pub(crate) type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

/// An accepted response body, decoded into content fragments.
///
/// Dropping the stream closes the underlying connection.
pub struct CompletionStream {
    byte_stream: ByteStream,
    parser: SseParser,
    pending: VecDeque<ParseResult>,
    utf8_buffer: Vec<u8>,
    lenient_eof: bool,
    malformed_frames: usize,
    fragments: usize,
    finished: bool,
    body_end: Option<BodyEnd>,
}

/// How the body ended when no `[DONE]` was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyEnd {
    Clean,
    MidFrame,
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("finished", &self.finished)
            .field("fragments", &self.fragments)
            .field("malformed_frames", &self.malformed_frames)
            .field("pending_len", &self.pending.len())
            .field("utf8_buffer_len", &self.utf8_buffer.len())
            .field("parser_buffer_len", &self.parser.remaining_buffer().len())
            .finish_non_exhaustive()
    }
}

impl CompletionStream {
    pub(crate) fn from_byte_stream(byte_stream: ByteStream, lenient_eof: bool) -> Self {
        Self {
            byte_stream,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            utf8_buffer: Vec::new(),
            lenient_eof,
            malformed_frames: 0,
            fragments: 0,
            finished: false,
            body_end: None,
        }
    }

    /// Returns `Some(done)` when a terminal result was drained.
    fn drain_pending(&mut self) -> Option<Option<String>> {
        while let Some(result) = self.pending.pop_front() {
            match result {
                ParseResult::Chunk(StreamChunk::Content(content)) => {
                    if content.is_empty() {
                        continue;
                    }
                    self.fragments += 1;
                    return Some(Some(content));
                }
                ParseResult::Chunk(StreamChunk::Done) => {
                    self.finish_clean();
                    return Some(None);
                }
                ParseResult::Malformed(frame) => {
                    self.malformed_frames += 1;
                    if self.malformed_frames == 1 {
                        warn!(reason = %frame.reason, line = %frame.line, "Skipping malformed SSE frame");
                    } else {
                        debug!(reason = %frame.reason, "Skipping malformed SSE frame");
                    }
                }
            }
        }
        None
    }

    fn finish_clean(&mut self) {
        self.finished = true;
        self.pending.clear();
        info!(
            fragments = self.fragments,
            malformed_frames = self.malformed_frames,
            "Completion stream finished"
        );
    }

    fn interrupt(&mut self, reason: String) -> PlannerError {
        self.finished = true;
        self.pending.clear();
        warn!(fragments = self.fragments, %reason, "Completion stream interrupted");
        PlannerError::StreamInterrupted(reason)
    }

    /// Returns the next non-empty content fragment, or `None` once the stream
    /// has finished normally.
    ///
    /// # Errors
    ///
    /// Returns `StreamInterrupted` if reading the body fails, the body is not
    /// valid UTF-8, or the connection closes before `[DONE]` (unless
    /// `lenient_eof` is set and the body did not end inside a frame).
    pub async fn next_fragment(&mut self) -> Result<Option<String>, PlannerError> {
        loop {
            if let Some(result) = self.drain_pending() {
                return Ok(result);
            }
            if self.finished {
                return Ok(None);
            }
            if let Some(end) = self.body_end {
                return self.close(end);
            }

            match self.byte_stream.next().await {
                Some(Ok(bytes)) => self.feed_bytes(&bytes)?,
                Some(Err(e)) => {
                    return Err(self.interrupt(format!("Error reading streaming response: {e}")));
                }
                None => return self.end_of_body(),
            }
        }
    }

    fn feed_bytes(&mut self, bytes: &[u8]) -> Result<(), PlannerError> {
        // Keep an incomplete trailing UTF-8 sequence until the next read.
        self.utf8_buffer.extend_from_slice(bytes);

        let valid_up_to = match std::str::from_utf8(&self.utf8_buffer) {
            Ok(_) => self.utf8_buffer.len(),
            Err(e) => {
                if e.error_len().is_some() {
                    return Err(self.interrupt("Invalid UTF-8 in streaming response".to_string()));
                }
                e.valid_up_to()
            }
        };

        if valid_up_to > 0 {
            let text = String::from_utf8_lossy(&self.utf8_buffer[..valid_up_to]);
            let results = self.parser.feed(&text);
            self.pending.extend(results);
            self.utf8_buffer.drain(..valid_up_to);
        }
        Ok(())
    }

    fn end_of_body(&mut self) -> Result<Option<String>, PlannerError> {
        if !self.utf8_buffer.is_empty() {
            return Err(self.interrupt("Connection closed inside a UTF-8 sequence".to_string()));
        }

        // An unterminated last line may still hold a complete frame.
        let end = match self.parser.finish() {
            Some(ParseResult::Chunk(StreamChunk::Done)) => {
                self.finish_clean();
                return Ok(None);
            }
            Some(tail @ ParseResult::Chunk(StreamChunk::Content(_))) => {
                self.pending.push_back(tail);
                BodyEnd::Clean
            }
            Some(ParseResult::Malformed(_)) => BodyEnd::MidFrame,
            None => BodyEnd::Clean,
        };
        self.body_end = Some(end);

        if let Some(result) = self.drain_pending() {
            return Ok(result);
        }
        self.close(end)
    }

    fn close(&mut self, end: BodyEnd) -> Result<Option<String>, PlannerError> {
        match end {
            BodyEnd::Clean if self.lenient_eof => {
                warn!("Completion stream closed without [DONE]; treating as completed");
                self.finish_clean();
                Ok(None)
            }
            BodyEnd::Clean => Err(self.interrupt("connection closed before [DONE]".to_string())),
            BodyEnd::MidFrame => {
                Err(self.interrupt("connection closed in the middle of a frame".to_string()))
            }
        }
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of non-empty fragments yielded so far.
    #[must_use]
    pub const fn fragments(&self) -> usize {
        self.fragments
    }

    /// Collects all remaining fragments into a single string.
    ///
    /// # Errors
    ///
    /// Returns the first stream error encountered.
    pub async fn collect_text(&mut self) -> Result<String, PlannerError> {
        let mut collected = String::new();
        while let Some(fragment) = self.next_fragment().await? {
            collected.push_str(&fragment);
        }
        Ok(collected)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ai::facts::AuxiliaryFacts;
    use crate::ai::prompt_builder::PromptBuilder;
    use crate::core::models::{ActivityPreference, TripRequest};

    pub(crate) fn frame(content: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    pub(crate) fn stream_of(chunks: Vec<Vec<u8>>, lenient_eof: bool) -> CompletionStream {
        let items = chunks
            .into_iter()
            .map(|c| Ok(bytes::Bytes::from(c)))
            .collect::<Vec<Result<bytes::Bytes, reqwest::Error>>>();
        CompletionStream::from_byte_stream(Box::pin(futures::stream::iter(items)), lenient_eof)
    }

    fn client() -> CompletionStreamClient {
        let config = ClientConfig::new("http://127.0.0.1:9/v1/chat/completions", "gsk_test").unwrap();
        CompletionStreamClient::new(config).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let request = TripRequest::new("Tokyo", 2, 1000.0, 1, ActivityPreference::Outdoor).unwrap();
        let conv = PromptBuilder::default().build(&request, &AuxiliaryFacts::default());
        let body = client().request_body(&conv);

        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["temperature"], json!(0.6));
        assert_eq!(body["temperature"].to_string(), "0.6");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_request_body_omits_unset_options() {
        let mut config = ClientConfig::new("http://127.0.0.1:9/v1", "k").unwrap();
        config.temperature = None;
        config.max_tokens = None;
        let client = CompletionStreamClient::new(config).unwrap();
        let conv = crate::ai::prompt_builder::Conversation::new("s".into(), "u".into());
        let body = client.request_body(&conv);

        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_fragments_in_order_until_done() {
        let sse = format!("{}{}{}data: [DONE]\n\n", frame("a"), frame("b"), frame("c"));
        let mut stream = stream_of(vec![sse.into_bytes()], false);

        assert_eq!(stream.next_fragment().await.unwrap(), Some("a".to_string()));
        assert_eq!(stream.next_fragment().await.unwrap(), Some("b".to_string()));
        assert_eq!(stream.next_fragment().await.unwrap(), Some("c".to_string()));
        assert_eq!(stream.next_fragment().await.unwrap(), None);
        assert!(stream.is_finished());
        assert_eq!(stream.fragments(), 3);
    }

    #[tokio::test]
    async fn test_nothing_is_read_after_done() {
        let sse = format!("{}data: [DONE]\n\n{}", frame("a"), frame("late"));
        let mut stream = stream_of(vec![sse.into_bytes(), frame("later").into_bytes()], false);

        assert_eq!(stream.collect_text().await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_empty_fragments_are_skipped() {
        let sse = format!("{}{}data: [DONE]\n", frame(""), frame("x"));
        let mut stream = stream_of(vec![sse.into_bytes()], false);

        assert_eq!(stream.next_fragment().await.unwrap(), Some("x".to_string()));
        assert_eq!(stream.fragments(), 1);
    }

    #[tokio::test]
    async fn test_utf8_split_across_byte_chunks() {
        let event = format!("{}data: [DONE]\n", frame("早上 京都"));
        let bytes = event.as_bytes();
        let split_at = bytes
            .iter()
            .position(|b| *b == 0xE6)
            .expect("expected UTF-8 multi-byte sequence in test input");

        let mut stream = stream_of(
            vec![bytes[..=split_at].to_vec(), bytes[split_at + 1..].to_vec()],
            false,
        );

        assert_eq!(stream.collect_text().await.unwrap(), "早上 京都");
    }

    #[tokio::test]
    async fn test_malformed_frame_is_skipped() {
        let sse = format!("{}data: {{oops\n{}data: [DONE]\n", frame("a"), frame("b"));
        let mut stream = stream_of(vec![sse.into_bytes()], false);

        assert_eq!(stream.collect_text().await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn test_eof_without_done_is_interrupted() {
        let sse = format!("{}{}", frame("a"), frame("b"));
        let mut stream = stream_of(vec![sse.into_bytes()], false);

        assert_eq!(stream.next_fragment().await.unwrap(), Some("a".to_string()));
        assert_eq!(stream.next_fragment().await.unwrap(), Some("b".to_string()));
        let err = stream.next_fragment().await.unwrap_err();
        assert!(matches!(err, PlannerError::StreamInterrupted(_)));
        assert!(err.to_string().contains("before [DONE]"));
    }

    #[tokio::test]
    async fn test_lenient_eof_completes_on_clean_close() {
        let sse = format!("{}{}", frame("a"), frame("b"));
        let mut stream = stream_of(vec![sse.into_bytes()], true);

        assert_eq!(stream.collect_text().await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn test_lenient_eof_still_rejects_truncated_frame() {
        let sse = format!("{}data: {{\"choices\":[{{\"del", frame("a"));
        let mut stream = stream_of(vec![sse.into_bytes()], true);

        assert_eq!(stream.next_fragment().await.unwrap(), Some("a".to_string()));
        let err = stream.next_fragment().await.unwrap_err();
        assert!(err.to_string().contains("middle of a frame"));
    }

    #[tokio::test]
    async fn test_unterminated_final_frame_is_kept() {
        let sse = format!("{}{}", frame("a"), frame("b").trim_end());
        let mut stream = stream_of(vec![sse.into_bytes()], false);

        assert_eq!(stream.next_fragment().await.unwrap(), Some("a".to_string()));
        assert_eq!(stream.next_fragment().await.unwrap(), Some("b".to_string()));
        let err = stream.next_fragment().await.unwrap_err();
        assert!(err.to_string().contains("before [DONE]"));
        assert_eq!(stream.fragments(), 2);
    }

    #[tokio::test]
    async fn test_lenient_eof_completes_after_unterminated_final_frame() {
        let sse = format!("{}{}", frame("a"), frame("b").trim_end());
        let mut stream = stream_of(vec![sse.into_bytes()], true);

        assert_eq!(stream.collect_text().await.unwrap(), "ab");
        assert!(stream.is_finished());
    }

    #[tokio::test]
    async fn test_unterminated_done_line_completes() {
        let sse = format!("{}data: [DONE]", frame("a"));
        let mut stream = stream_of(vec![sse.into_bytes()], false);

        assert_eq!(stream.collect_text().await.unwrap(), "a");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_interrupted() {
        let mut stream = stream_of(vec![vec![0xFF, b'\n']], false);
        let err = stream.next_fragment().await.unwrap_err();
        assert!(err.to_string().contains("Invalid UTF-8"));
    }

    #[tokio::test]
    async fn test_body_read_error_is_interrupted() {
        // Build a reqwest::Error without doing any network I/O.
        let req_err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let items: Vec<Result<bytes::Bytes, reqwest::Error>> =
            vec![Ok(bytes::Bytes::from(frame("a"))), Err(req_err)];
        let mut stream =
            CompletionStream::from_byte_stream(Box::pin(futures::stream::iter(items)), false);

        assert_eq!(stream.next_fragment().await.unwrap(), Some("a".to_string()));
        let err = stream.next_fragment().await.unwrap_err();
        assert!(err.to_string().contains("Error reading streaming response"));
        assert_eq!(stream.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        let conv = crate::ai::prompt_builder::Conversation::new("s".into(), "u".into());
        let err = client().open_stream(&conv).await.unwrap_err();
        assert!(matches!(err, PlannerError::Connection(_)));
    }
}
