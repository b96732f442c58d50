//! Stream command - prints a completion as it arrives

use std::future::Future;
use std::io::Write;

use anyhow::Context;
use clap::Args;
use futures::{Stream, StreamExt};
use tokio::signal;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::{ChatRequest, StreamChunk, StreamError};
use crate::infrastructure::llm::{StreamSummary, StreamingCompletionClient};
use crate::infrastructure::logging::init_logging;

const DEFAULT_PROMPT: &str = "Say this is a test";

/// Arguments for the stream command
#[derive(Args, Clone, Debug)]
pub struct StreamArgs {
    /// User prompt to send
    #[arg(default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Endpoint base URL (overrides config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// API key sent as a bearer token (overrides config)
    #[arg(long)]
    pub key: Option<String>,

    /// Model identifier (overrides config)
    #[arg(long)]
    pub model: Option<String>,

    /// Optional system message sent before the prompt
    #[arg(long)]
    pub system: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Print each raw event payload instead of the text deltas
    #[arg(long)]
    pub raw: bool,
}

impl StreamArgs {
    /// Layer command-line values over loaded configuration
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(ref base_url) = self.base_url {
            config.endpoint.base_url = base_url.clone();
        }

        if let Some(ref key) = self.key {
            config.endpoint.api_key = key.clone();
        }

        if let Some(ref model) = self.model {
            config.endpoint.model = model.clone();
        }
    }

    pub fn to_request(&self) -> ChatRequest {
        let mut builder = ChatRequest::builder();

        if let Some(ref system) = self.system {
            builder = builder.system(system.clone());
        }

        builder = builder.user(self.prompt.clone()).stream(true);

        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }

        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        builder.build()
    }
}

/// What to print for one chunk
pub fn render_chunk(chunk: &StreamChunk, raw: bool) -> Option<String> {
    if raw {
        Some(format!("{}\n", chunk.raw()))
    } else {
        chunk.delta().map(str::to_string)
    }
}

/// Write chunks to `out` until the stream ends or `cancel` resolves.
///
/// `cancel` is polled alongside the stream for the whole run, so a
/// cancellation that fires between chunks is never lost.
pub async fn print_stream<S, C, W>(
    mut stream: S,
    cancel: C,
    out: &mut W,
    raw: bool,
) -> anyhow::Result<StreamSummary>
where
    S: Stream<Item = Result<StreamChunk, StreamError>> + Unpin,
    C: Future,
    W: Write,
{
    tokio::pin!(cancel);
    let mut summary = StreamSummary::new();

    loop {
        let next = tokio::select! {
            next = stream.next() => next,
            _ = &mut cancel => {
                warn!("Cancelled, abandoning stream");
                break;
            }
        };

        let Some(chunk) = next else {
            break;
        };

        let chunk = chunk.context("Completion stream failed")?;
        summary.record(&chunk);

        if let Some(text) = render_chunk(&chunk, raw) {
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
    }

    Ok(summary)
}

/// Run the stream command
pub async fn run(args: StreamArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    init_logging(&config.logging);

    let client = StreamingCompletionClient::from_config(&config)
        .context("Invalid endpoint configuration")?;

    let stream = client
        .stream_completion(args.to_request())
        .await
        .context("Failed to open completion stream")?;

    let mut stdout = std::io::stdout();
    let summary = print_stream(stream, signal::ctrl_c(), &mut stdout, args.raw).await?;

    if !args.raw {
        writeln!(stdout)?;
    }

    info!(
        chunks = summary.chunks(),
        model = summary.model().unwrap_or(&config.endpoint.model),
        finish_reason = ?summary.finish_reason(),
        total_tokens = ?summary.total_tokens(),
        "Completion finished"
    );

    Ok(())
}
