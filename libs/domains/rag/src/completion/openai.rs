use std::fmt::Display;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::OpenAIConfig;
use crate::error::{RagError, RagResult};
use crate::models::{Message, Role};
use crate::provider::{CompletionModel, CompletionStream};

/// Streaming chat completions against an OpenAI-compatible API
pub struct OpenAICompletion {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAICompletion {
    pub fn new(config: OpenAIConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: OpenAIConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    seed: i64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl From<Message> for ChatMessage {
    fn from(message: Message) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::User | Role::Unspecified => "user",
        };
        Self {
            role,
            content: message.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    delta: ChatDelta,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[async_trait]
impl CompletionModel for OpenAICompletion {
    async fn stream_completion(&self, transcript: Vec<Message>) -> RagResult<CompletionStream> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: transcript.into_iter().map(Into::into).collect(),
            stream: true,
            seed: 0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Completion(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::Completion(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        Ok(decode_event_stream(response.bytes_stream()))
    }
}

/// Turns a server-sent-event body into content deltas.
fn decode_event_stream<S, E>(body: S) -> CompletionStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut body = Box::pin(body);
        let mut lines = LineBuffer::default();

        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| RagError::Completion(format!("stream read failed: {}", e)))?;
            for line in lines.push(&chunk) {
                match parse_event_line(&line)? {
                    EventLine::Delta(text) => yield text,
                    EventLine::Done => break 'read,
                    EventLine::Skip => {}
                }
            }
        }

        if let Some(line) = lines.finish() {
            if let EventLine::Delta(text) = parse_event_line(&line)? {
                yield text;
            }
        }
    })
}

#[derive(Debug, PartialEq)]
enum EventLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_event_line(line: &str) -> RagResult<EventLine> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        // Blank separators, comments, `event:` and `id:` fields.
        return Ok(EventLine::Skip);
    };

    let data = data.trim();
    if data == "[DONE]" {
        return Ok(EventLine::Done);
    }

    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| RagError::Completion(format!("invalid stream chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(RagError::Completion(error.message));
    }

    match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
        Some(content) if !content.is_empty() => Ok(EventLine::Delta(content)),
        _ => Ok(EventLine::Skip),
    }
}

/// Splits a byte stream on newlines. Bytes are buffered until a full line
/// arrives so multi-byte characters may straddle network chunks.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line));
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(decode_line(&line))
    }
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}
