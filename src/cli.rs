//! CLI argument parsing using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HTTP relay and console formatter for the Claude CLI.
///
/// `serve` exposes the agent over HTTP; `run` and `format` turn its
/// stream-json output into something a person can follow.
#[derive(Parser, Debug)]
#[command(name = "claude-relay", version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the agent over HTTP (GET /healthz, POST /claude)
    Serve {
        /// Port to listen on
        #[arg(short, long, value_name = "PORT", env = "PORT")]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Agent command to spawn
        #[arg(long, env = "CLAUDE_RELAY_AGENT")]
        agent: Option<String>,
    },
    /// Run one prompt and print the formatted event stream
    Run {
        /// Prompt to send
        #[arg(value_name = "PROMPT")]
        prompt: String,

        /// Working directory for the agent
        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,

        /// Agent command to spawn
        #[arg(long, env = "CLAUDE_RELAY_AGENT")]
        agent: Option<String>,

        /// Do not keep a raw NDJSON log of the run
        #[arg(long)]
        no_log: bool,

        /// Extra arguments passed through to the agent (after `--`)
        #[arg(last = true, value_name = "ARGS")]
        extra: Vec<String>,
    },
    /// Format a captured stream-json log (file or stdin)
    Format {
        /// Log file to read; stdin when omitted or `-`
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
