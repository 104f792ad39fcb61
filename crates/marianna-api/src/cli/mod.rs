//! CLI command definitions for the `marianna` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat with Marianna, a persona that answers in short message bursts.
#[derive(Parser)]
#[command(name = "marianna", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat server.
    Serve {
        /// Port to listen on (overrides `[server] port`).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides `[server] host`).
        #[arg(long)]
        host: Option<String>,
    },

    /// Show store, generator, and delivery settings.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
