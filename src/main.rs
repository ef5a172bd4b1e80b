//! claude-relay - HTTP relay and console formatter for the Claude CLI

use anyhow::{Context, Result};
use clap::CommandFactory;
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use claude_relay::claude::client::{self, AgentRequest};
use claude_relay::cli::{Args, Command};
use claude_relay::config::{self, Config, CONFIG_FILE};
use claude_relay::output::{formatter, logger};
use claude_relay::server;

fn main() -> ExitCode {
    match run() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse_args();

    match args.command {
        Some(Command::Serve { port, bind, agent }) => {
            let config = load_config(port, bind, agent, false)?;

            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(server::serve(config))?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Run {
            prompt,
            cwd,
            agent,
            no_log,
            extra,
        }) => {
            let config = load_config(None, None, agent, no_log)?;
            run_prompt(&config, prompt, cwd, extra)
        }
        Some(Command::Format { file }) => {
            logger::init_tracing("info");
            format_log(file)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            Args::command().print_help()?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Discover `.relay.toml`, apply overrides, and start tracing.
fn load_config(
    port: Option<u16>,
    bind: Option<String>,
    agent: Option<String>,
    no_log: bool,
) -> Result<Config> {
    let project = config::discover()?;
    let config = Config::from_args(port, bind, agent, no_log, project)?;

    logger::init_tracing(&config.log_level);
    if let Some(root) = &config.project_root {
        tracing::info!("loaded {}", root.join(CONFIG_FILE).display());
    }
    Ok(config)
}

fn run_prompt(
    config: &Config,
    prompt: String,
    cwd: Option<PathBuf>,
    extra: Vec<String>,
) -> Result<ExitCode> {
    formatter::print_run_header(&config.agent, &prompt);

    let mut raw_log = logger::open_run_log(config.raw_log);
    if let Some(log) = &raw_log {
        formatter::print_log_path(log.path());
    }

    let request = AgentRequest {
        prompt,
        args: extra,
        cwd,
    };
    let outcome = client::run_streaming(
        &config.agent,
        &config.extra_args,
        &request,
        raw_log.as_mut(),
        formatter::print_rendered,
    )?;

    if outcome.success() {
        return Ok(ExitCode::SUCCESS);
    }

    let status = outcome
        .code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    eprintln!("{}", format!("Agent exited unsuccessfully ({})", status).red());
    Ok(ExitCode::FAILURE)
}

/// Render a captured log. `-` or no file means stdin, streamed line by line.
fn format_log(file: Option<PathBuf>) -> Result<()> {
    match file.filter(|p| p.as_os_str() != "-") {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            for rendered in formatter::render_document(&text) {
                formatter::print_rendered(&rendered);
            }
        }
        None => {
            client::stream_output(io::stdin().lock(), None, formatter::print_rendered)?;
        }
    }
    Ok(())
}
