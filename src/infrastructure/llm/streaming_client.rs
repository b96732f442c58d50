use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::http_client::{ByteStream, HttpClient, HttpClientTrait};
use super::sse::{SseDecoder, SseEvent, DONE_MARKER};
use crate::config::{AppConfig, EndpointConfig, HttpConfig};
use crate::domain::{ChatRequest, ChunkStream, CompletionStreamer, StreamChunk, StreamError};

/// Opens streamed chat completions against an OpenAI-compatible endpoint
pub struct StreamingCompletionClient<C: HttpClientTrait = HttpClient> {
    client: C,
    endpoint: EndpointConfig,
    auth_header: String,
    completions_url: String,
}

impl StreamingCompletionClient<HttpClient> {
    /// Build a reqwest-backed client from loaded configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, StreamError> {
        let client = HttpClient::new(&config.http)?;
        Self::new(client, config.endpoint.clone())
    }
}

impl<C: HttpClientTrait> StreamingCompletionClient<C> {
    pub fn new(client: C, endpoint: EndpointConfig) -> Result<Self, StreamError> {
        endpoint.validate()?;

        let completions_url = endpoint.completions_url()?;
        let auth_header = format!("Bearer {}", endpoint.api_key);

        Ok(Self {
            client,
            endpoint,
            auth_header,
            completions_url,
        })
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    pub fn completions_url(&self) -> &str {
        &self.completions_url
    }

    fn build_request(&self, request: &ChatRequest) -> serde_json::Value {
        let model = request.model.as_deref().unwrap_or(&self.endpoint.model);

        let mut body = serde_json::json!({
            "model": model,
            "messages": request.messages,
            "stream": true,
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }

        if let Some(ref stop) = request.stop {
            body["stop"] = serde_json::json!(stop);
        }

        if let Some(tier) = request.forwarded_service_tier() {
            body["service_tier"] = serde_json::json!(tier);
        }

        body
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
            ("Accept", "text/event-stream"),
        ]
    }

    /// Send one streamed chat completion request.
    ///
    /// Resolves once the endpoint has accepted the request; chunks are then
    /// pulled from the returned stream in the order the endpoint sent them.
    /// Requests without messages fail before anything is sent.
    pub async fn stream_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionStream, StreamError> {
        request.validate()?;

        let mut request = request;
        request.stream = true;

        let body = self.build_request(&request);

        info!(
            url = %self.completions_url,
            model = %body["model"],
            messages = request.messages.len(),
            "Opening completion stream"
        );

        let byte_stream = self
            .client
            .post_json_stream(&self.completions_url, self.headers(), &body)
            .await
            .inspect_err(|e| warn!(error = %e, "Completion request failed"))?;

        Ok(CompletionStream::new(byte_stream))
    }
}

impl<C: HttpClientTrait> std::fmt::Debug for StreamingCompletionClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingCompletionClient")
            .field("client", &self.client)
            .field("endpoint", &self.endpoint)
            .field("completions_url", &self.completions_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: HttpClientTrait> CompletionStreamer for StreamingCompletionClient<C> {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, StreamError> {
        let stream = self.stream_completion(request).await?;
        Ok(Box::pin(stream))
    }

    fn default_model(&self) -> &str {
        &self.endpoint.model
    }
}

/// Stream one completion with a freshly built client
pub async fn stream_completion(
    endpoint: &EndpointConfig,
    request: ChatRequest,
) -> Result<CompletionStream, StreamError> {
    let client = HttpClient::new(&HttpConfig::default())?;
    StreamingCompletionClient::new(client, endpoint.clone())?
        .stream_completion(request)
        .await
}

/// The chunks of one streamed completion.
///
/// Ends with `None` after the `[DONE]` marker, or after the first error.
/// Dropping it early closes the connection without raising anything.
pub struct CompletionStream {
    inner: ChunkStream,
    chunks_received: usize,
    terminated: bool,
}

impl CompletionStream {
    fn new(body: ByteStream) -> Self {
        let state = DecodeState {
            body,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            delivered: 0,
            body_ended: false,
            finished: false,
        };

        let inner = futures::stream::unfold(state, |mut state| async move {
            let item = state.next_chunk().await?;
            Some((item, state))
        });

        Self {
            inner: Box::pin(inner),
            chunks_received: 0,
            terminated: false,
        }
    }

    /// Number of chunks handed out so far
    pub fn chunks_received(&self) -> usize {
        self.chunks_received
    }

    /// Whether the stream has ended, normally or with an error
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl Stream for CompletionStream {
    type Item = Result<StreamChunk, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.terminated {
            return Poll::Ready(None);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.chunks_received += 1;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.terminated = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.terminated = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("chunks_received", &self.chunks_received)
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        if !self.terminated {
            debug!(
                chunks_received = self.chunks_received,
                "Completion stream abandoned, closing connection"
            );
        }
    }
}

/// Body bytes in, chunks out
struct DecodeState {
    body: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    delivered: usize,
    body_ended: bool,
    finished: bool,
}

impl DecodeState {
    async fn next_chunk(&mut self) -> Option<Result<StreamChunk, StreamError>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(event) = self.pending.pop_front() {
                return match event {
                    SseEvent::Done => {
                        debug!(chunks = self.delivered, "Completion stream finished");
                        self.finished = true;
                        None
                    }
                    SseEvent::Data(data) => Some(self.chunk_from(data)),
                };
            }

            let next = if self.body_ended {
                None
            } else {
                self.body.next().await
            };

            match next {
                Some(Ok(bytes)) => match self.decoder.feed(&bytes) {
                    Ok(events) => self.pending.extend(events),
                    Err(e) => return Some(self.fail(e)),
                },
                Some(Err(e)) => {
                    let error = StreamError::interrupted(self.delivered, e.to_string());
                    return Some(self.fail(error));
                }
                None if !self.body_ended => {
                    self.body_ended = true;
                    match self.decoder.finish() {
                        Ok(Some(event)) => self.pending.push_back(event),
                        Ok(None) => {}
                        Err(e) => return Some(self.fail(e)),
                    }
                }
                None => {
                    let error = StreamError::interrupted(
                        self.delivered,
                        format!("connection closed before {} marker", DONE_MARKER),
                    );
                    return Some(self.fail(error));
                }
            }
        }
    }

    fn chunk_from(&mut self, data: String) -> Result<StreamChunk, StreamError> {
        let chunk = match StreamChunk::from_data(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                return self.fail(StreamError::protocol(format!(
                    "event payload is not JSON: {}",
                    e
                )))
            }
        };

        if let Some(message) = chunk.error_message() {
            return self.fail(StreamError::protocol(format!(
                "endpoint reported an error: {}",
                message
            )));
        }

        self.delivered += 1;
        Ok(chunk)
    }

    fn fail<T>(&mut self, error: StreamError) -> Result<T, StreamError> {
        warn!(chunks = self.delivered, error = %error, "Completion stream failed");
        self.finished = true;
        Err(error)
    }
}
