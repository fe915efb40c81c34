//! Chat-completion transport for OpenAI-compatible providers.
//!
//! # Architecture
//!
//! - [`ChatTransport`]: sends one chat request to one [`ProviderCandidate`]
//! - [`ChunkSink`]: receives streamed content as it arrives
//! - [`OpenAiClient`]: the HTTP implementation, speaking the
//!   `POST {base_url}/chat/completions` dialect with either a single JSON
//!   response or a `text/event-stream` body
//!
//! The engine never branches on streaming itself: it builds a [`ChatRequest`]
//! with `stream` set and hands over a sink. In batch mode the sink stays
//! silent.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::utils::truncate_for_log;

/// Fixed sampling temperature for digest generation.
pub const TEMPERATURE: f32 = 0.7;

/// One configured model backend.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCandidate {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for ProviderCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCandidate")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Why a single provider call failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Provider-independent part of a chat call; the model id comes from the
/// candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

/// Receives incremental output of a streamed completion.
pub trait ChunkSink: Send {
    fn on_chunk(&mut self, chunk: &str);

    /// Called once after the last chunk of a stream, or to close off the
    /// partial output of a provider that failed mid-stream.
    fn finish(&mut self) {}
}

/// Discards every chunk.
#[derive(Debug, Default)]
pub struct NullSink;

impl ChunkSink for NullSink {
    fn on_chunk(&mut self, _chunk: &str) {}
}

/// Writes chunks to stdout as they arrive.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ChunkSink for ConsoleSink {
    fn on_chunk(&mut self, chunk: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(chunk.as_bytes());
        let _ = out.flush();
    }

    fn finish(&mut self) {
        println!();
    }
}

/// Collects chunks in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct VecSink {
    pub chunks: Vec<String>,
    pub finishes: usize,
}

#[cfg(test)]
impl ChunkSink for VecSink {
    fn on_chunk(&mut self, chunk: &str) {
        self.chunks.push(chunk.to_string());
    }

    fn finish(&mut self) {
        self.finishes += 1;
    }
}

/// Sends a chat request to one provider.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(
        &self,
        provider: &ProviderCandidate,
        request: &ChatRequest,
        sink: &mut dyn ChunkSink,
    ) -> Result<String, ProviderError>;
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: Option<WireContent>,
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct WireChunkChoice {
    delta: Option<WireContent>,
}

#[derive(Deserialize)]
struct WireContent {
    content: Option<String>,
}

/// HTTP transport for OpenAI-style chat APIs.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}/chat/completions", base_url.trim_end_matches('/'))
    }

    async fn send(
        &self,
        provider: &ProviderCandidate,
        request: &ChatRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let body = WireRequest {
            model: &provider.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: request.stream,
        };
        let resp = self
            .http
            .post(Self::endpoint(&provider.base_url))
            .bearer_auth(&provider.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }
        Ok(resp)
    }

    async fn complete_batch(&self, resp: reqwest::Response) -> Result<String, ProviderError> {
        let text = resp.text().await?;
        let parsed: WireResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("{e}: {}", truncate_for_log(&text, 200))))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("response contained no choices".to_string()))?;
        Ok(choice.message.and_then(|m| m.content).unwrap_or_default())
    }

    async fn complete_stream(
        &self,
        resp: reqwest::Response,
        sink: &mut dyn ChunkSink,
    ) -> Result<String, ProviderError> {
        let mut decoder = SseDecoder::default();
        let mut output = String::new();
        let mut bytes = resp.bytes_stream();

        let mut done = false;
        let mut saw_event = false;
        'read: while let Some(chunk) = bytes.next().await {
            for data in decoder.push(&chunk?) {
                saw_event = true;
                if let StreamStep::Done = handle_stream_data(&data, &mut output, sink)? {
                    done = true;
                    break 'read;
                }
            }
        }
        if !done {
            for data in decoder.finish() {
                saw_event = true;
                if let StreamStep::Done = handle_stream_data(&data, &mut output, sink)? {
                    break;
                }
            }
        }
        // A 200 with a plain JSON error body carries no `data:` lines at all.
        if !saw_event {
            return Err(ProviderError::Malformed("stream ended without any events".to_string()));
        }
        sink.finish();
        Ok(output)
    }
}

enum StreamStep {
    Continue,
    Done,
}

fn handle_stream_data(
    data: &str,
    output: &mut String,
    sink: &mut dyn ChunkSink,
) -> Result<StreamStep, ProviderError> {
    if data == "[DONE]" {
        return Ok(StreamStep::Done);
    }
    let chunk: WireChunk = serde_json::from_str(data)
        .map_err(|e| ProviderError::Malformed(format!("{e}: {}", truncate_for_log(data, 200))))?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::Malformed(format!(
            "stream error: {}",
            truncate_for_log(&err.to_string(), 200)
        )));
    }
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .unwrap_or_default();
    if !content.is_empty() {
        sink.on_chunk(&content);
        output.push_str(&content);
    }
    Ok(StreamStep::Continue)
}

#[async_trait]
impl ChatTransport for OpenAiClient {
    #[instrument(level = "info", skip_all, fields(provider = %provider.name, model = %provider.model, stream = request.stream))]
    async fn complete(
        &self,
        provider: &ProviderCandidate,
        request: &ChatRequest,
        sink: &mut dyn ChunkSink,
    ) -> Result<String, ProviderError> {
        let t0 = Instant::now();
        let resp = self.send(provider, request).await;
        let res = match resp {
            Ok(resp) if request.stream => self.complete_stream(resp, sink).await,
            Ok(resp) => self.complete_batch(resp).await,
            Err(e) => Err(e),
        };
        let dt = t0.elapsed();

        match &res {
            Ok(text) => debug!(elapsed_ms = dt.as_millis() as u64, chars = text.chars().count(), "Chat completion finished"),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "Chat completion failed"),
        }
        res
    }
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network chunks decode correctly. Only `data:`
/// fields are returned; comments, `event:` and `id:` lines are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes, returning the data payloads of every complete line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = Self::data_of(&line) {
                out.push(data);
            }
        }
        out
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        Self::data_of(&line).into_iter().collect()
    }

    fn data_of(line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        let data = line.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);
        if data.is_empty() {
            None
        } else {
            Some(data.to_string())
        }
    }
}
