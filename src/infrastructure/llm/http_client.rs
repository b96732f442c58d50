use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{self, HeaderValue};
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

use crate::config::HttpConfig;
use crate::domain::StreamError;

/// Stream type for HTTP response bodies
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Longest error body quoted back in a protocol error
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Most bytes read off a non-success response
const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

/// How long a non-success response gets to deliver its body
const ERROR_BODY_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    /// POST a JSON body and hand back the response body as it arrives.
    ///
    /// Resolves once the status line and headers are in. Non-success
    /// statuses and non event-stream bodies are rejected here, before any
    /// body bytes are surfaced.
    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, StreamError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, StreamError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone());

        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            StreamError::configuration(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, StreamError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.json(body).send().await.map_err(map_send_error)?;

        let status = response.status();
        debug!(%status, "Received response headers");

        if !status.is_success() {
            let error_body = read_error_body(response.bytes_stream(), ERROR_BODY_TIMEOUT).await;
            return Err(StreamError::http_status(
                status.as_u16(),
                format!("HTTP {}: {}", status, truncate(&error_body)),
            ));
        }

        if let Some(content_type) = response.headers().get(header::CONTENT_TYPE) {
            if !is_event_stream(content_type) {
                return Err(StreamError::protocol(format!(
                    "expected an event stream, got content type {:?}",
                    content_type
                )));
            }
        }

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| StreamError::connection(format!("Stream error: {}", e)))
        });

        Ok(Box::pin(stream))
    }
}

fn map_send_error(err: reqwest::Error) -> StreamError {
    if err.is_builder() {
        StreamError::configuration(format!("Invalid request: {}", err))
    } else {
        StreamError::connection(format!("Request failed: {}", err))
    }
}

fn is_event_stream(content_type: &HeaderValue) -> bool {
    content_type
        .to_str()
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case("text/event-stream")
        })
        .unwrap_or(false)
}

/// Collect at most `MAX_ERROR_BODY_BYTES` of an error body, giving up after
/// `timeout`. Whatever arrived before a read error or the deadline is kept.
async fn read_error_body<S, E>(body: S, timeout: Duration) -> String
where
    S: Stream<Item = Result<Bytes, E>>,
{
    tokio::pin!(body);
    let mut collected = Vec::new();

    let read = async {
        while let Some(Ok(bytes)) = body.next().await {
            collected.extend_from_slice(&bytes);
            if collected.len() >= MAX_ERROR_BODY_BYTES {
                break;
            }
        }
    };

    if tokio::time::timeout(timeout, read).await.is_err() {
        debug!("Timed out reading error response body");
    }

    collected.truncate(MAX_ERROR_BODY_BYTES);
    String::from_utf8_lossy(&collected).into_owned()
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", cut)
    }
}
