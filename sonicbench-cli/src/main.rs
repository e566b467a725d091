// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! sonicbench CLI
//!
//! Runs the HTTP client comparison and exits non-zero on a regression.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod commands;

/// sonicbench - HTTP client load-testing regression gate
#[derive(Parser)]
#[command(name = "sonicbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of requests per adapter [default: 1000]
    #[arg(short = 'n', long)]
    pub requests: Option<u64>,

    /// Maximum in-flight requests per adapter [default: 25]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Skip the thread-pool blocking client
    #[arg(long)]
    pub skip_requests: bool,

    /// Skip the semaphore-gated hyper client
    #[arg(long)]
    pub skip_httpx: bool,

    /// Harness configuration file (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Adapter that must be the fastest [default: sonic]
    #[arg(long)]
    pub target: Option<String>,

    /// Directory to save the JSON report into
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Go responder source [default: responder/server.go]
    #[arg(long)]
    pub go_server: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the responder in the foreground
    #[command(hide = true)]
    Serve {
        /// Port to listen on
        port: u16,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the report
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Serve { port }) => commands::serve::execute(port),
        None => commands::run::execute(&cli.run),
    }
}
