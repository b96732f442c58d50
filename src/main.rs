use clap::Parser;
use llm_stream_client::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Stream(args) => cli::stream::run(args).await,
    }
}
