//! CLI module for LLM Stream Client
//!
//! Provides subcommands:
//! - `stream`: send one prompt and print the reply as it streams in

pub mod stream;

use clap::{Parser, Subcommand};

/// LLM Stream Client - stream chat completions to the terminal
#[derive(Parser)]
#[command(name = "llm-stream-client")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stream one chat completion and print each chunk as it arrives
    Stream(stream::StreamArgs),
}
