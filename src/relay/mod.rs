//! Streaming relay for chat completions.
//!
//! A session goes `Opening -> Relaying -> {Completed, Failed}`. Upstream
//! bytes are forwarded unchanged as they arrive; the relay only watches the
//! framing to notice the `[DONE]` sentinel. Dropping the outbound stream drops
//! the upstream response, which aborts the request.

pub mod prompts;
pub mod sse;

use crate::config::RelayConfig;
use crate::error::RelayError;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use prompts::ChatMessage;
use serde::Serialize;
use sse::SseDecoder;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Opening,
    Relaying,
    Completed,
    Failed,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

pub struct CompletionRelay {
    api_base: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
}

impl CompletionRelay {
    pub fn new(config: &RelayConfig) -> Self {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, RelayError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| RelayError::Configuration("AI_API_KEY not configured".to_string()))
    }

    /// Issue the streaming request. Fails before touching the network when no
    /// credential is configured; a non-2xx answer carries the upstream body.
    pub async fn open(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<RelaySession, RelayError> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.api_base);
        debug!(state = ?RelayState::Opening, %model, "opening relay session");

        let request = CompletionRequest {
            model,
            messages,
            stream: true,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = RelayError::from_reqwest(e, self.timeout);
                warn!(error = %err, state = ?RelayState::Failed, "completions request failed");
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            warn!(status = status.as_u16(), state = ?RelayState::Failed, "completions upstream refused");
            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        info!(%model, "relay session open");
        let timeout = self.timeout;
        let upstream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| RelayError::from_reqwest(e, timeout)))
            .boxed();
        Ok(RelaySession::new(upstream))
    }
}

/// One open completions stream.
pub struct RelaySession {
    upstream: BoxStream<'static, Result<Bytes, RelayError>>,
    watcher: SseDecoder,
    state: RelayState,
    forwarded: usize,
}

impl RelaySession {
    pub fn new(upstream: BoxStream<'static, Result<Bytes, RelayError>>) -> Self {
        Self {
            upstream,
            watcher: SseDecoder::new(),
            state: RelayState::Relaying,
            forwarded: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Next upstream chunk, forwarded unchanged. `None` once the session is
    /// terminal; the chunk carrying the sentinel is still forwarded.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, RelayError>> {
        if matches!(self.state, RelayState::Completed | RelayState::Failed) {
            return None;
        }

        match self.upstream.next().await {
            Some(Ok(chunk)) => {
                self.forwarded += chunk.len();
                self.watcher.feed(&chunk);
                if self.watcher.is_done() {
                    self.complete("sentinel");
                }
                Some(Ok(chunk))
            }
            Some(Err(e)) => {
                self.state = RelayState::Failed;
                warn!(error = %e, bytes = self.forwarded, "relay session failed mid-stream");
                Some(Err(e))
            }
            None => {
                self.complete("upstream closed");
                None
            }
        }
    }

    fn complete(&mut self, reason: &str) {
        self.state = RelayState::Completed;
        info!(
            reason,
            bytes = self.forwarded,
            skipped_frames = self.watcher.skipped(),
            "relay session completed"
        );
        // Release the connection now rather than when the session is dropped.
        self.upstream = stream::empty().boxed();
    }

    /// Raw bytes for an outbound event-stream body.
    pub fn into_byte_stream(self) -> impl Stream<Item = Result<Bytes, RelayError>> + Send + 'static {
        stream::unfold(self, |mut session| async move {
            let chunk = session.next_chunk().await?;
            Some((chunk, session))
        })
    }

    /// Decoded text deltas, for callers that want content rather than bytes.
    pub fn into_deltas(self) -> impl Stream<Item = Result<String, RelayError>> + Send + 'static {
        sse::decode_deltas(self.into_byte_stream().boxed())
    }
}
