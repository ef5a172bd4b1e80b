//! Claude CLI process spawning and streaming.

use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{ChildStderr, Command, ExitStatus, Stdio};
use std::thread;

use crate::output::formatter;
use crate::output::logger::RawLog;
use crate::output::text::truncate;

use super::events::Event;
use super::parser;

/// One prompt to hand to the agent CLI.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub prompt: String,
    /// Extra CLI arguments for this request only.
    pub args: Vec<String>,
    /// Working directory for the agent process.
    pub cwd: Option<PathBuf>,
}

/// Captured output of a one-shot `--output-format json` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Outcome of a verbose `stream-json` run.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub code: Option<i32>,
    /// The raw JSON line of the last `result` event, if one arrived.
    pub result_line: Option<String>,
    pub stderr: String,
}

impl StreamOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Split a shell-style agent command into program and leading arguments.
///
/// Uses `shlex::split()` for POSIX-style tokenisation, so quoted paths
/// such as `"/opt/my tools/claude" --debug` work.
pub fn parse_agent_command(command: &str) -> Result<(String, Vec<String>)> {
    let parts = shlex::split(command)
        .ok_or_else(|| anyhow!("invalid agent command: failed to parse \"{}\"", command))?;
    let mut iter = parts.into_iter();
    let program = iter.next().ok_or_else(|| anyhow!("agent command is empty"))?;
    Ok((program, iter.collect()))
}

/// Arguments for a one-shot JSON run.
fn build_json_args(request: &AgentRequest, extra_args: &[String]) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        request.prompt.clone(),
        "--output-format".to_string(),
        "json".to_string(),
    ];
    args.extend(extra_args.iter().cloned());
    args.extend(request.args.iter().cloned());
    args
}

/// Arguments for a verbose streaming run.
fn build_streaming_args(request: &AgentRequest, extra_args: &[String]) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        request.prompt.clone(),
        "--verbose".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
    ];
    args.extend(extra_args.iter().cloned());
    args.extend(request.args.iter().cloned());
    args
}

fn build_command(agent: &str, args: Vec<String>, request: &AgentRequest) -> Result<Command> {
    let (program, mut argv) = parse_agent_command(agent)?;
    argv.extend(args);

    let mut cmd = Command::new(program);
    cmd.args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &request.cwd {
        cmd.current_dir(cwd);
    }
    Ok(cmd)
}

/// Run the agent once in JSON mode and capture everything it prints.
///
/// A non-zero exit is not an error here; callers inspect [`RunOutput::code`].
pub fn run_json(agent: &str, extra_args: &[String], request: &AgentRequest) -> Result<RunOutput> {
    let args = build_json_args(request, extra_args);
    let mut child = build_command(agent, args, request)?
        .spawn()
        .with_context(|| format!("Failed to spawn `{}`. Is it installed and in PATH?", agent))?;
    tracing::info!(pid = child.id(), "spawned agent in json mode");

    let mut stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;
    let stderr_thread = drain_stderr(stderr);

    let mut output = String::new();
    stdout
        .read_to_string(&mut output)
        .context("Failed to read agent stdout")?;

    let status = child.wait().context("Failed to wait for agent process")?;
    let stderr_output = stderr_thread.join().unwrap_or_default();
    log_exit(&status);

    Ok(RunOutput {
        code: status.code(),
        stdout: output,
        stderr: stderr_output,
    })
}

/// Run the agent in verbose stream-json mode.
///
/// Every rendered event is handed to `on_render` as it arrives; raw lines go
/// to `raw_log` when one is given. Open the log before calling this so a log
/// failure never interrupts a running agent.
pub fn run_streaming<F>(
    agent: &str,
    extra_args: &[String],
    request: &AgentRequest,
    raw_log: Option<&mut RawLog>,
    on_render: F,
) -> Result<StreamOutcome>
where
    F: FnMut(&str),
{
    let args = build_streaming_args(request, extra_args);
    let mut child = build_command(agent, args, request)?
        .spawn()
        .with_context(|| format!("Failed to spawn `{}`. Is it installed and in PATH?", agent))?;
    tracing::info!(pid = child.id(), "spawned agent in stream-json mode");

    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;
    let stderr_thread = drain_stderr(stderr);

    let result_line = stream_output(stdout, raw_log, on_render);

    let status = child.wait().context("Failed to wait for agent process")?;
    let stderr_output = stderr_thread.join().unwrap_or_default();
    log_exit(&status);

    Ok(StreamOutcome {
        code: status.code(),
        result_line: result_line?,
        stderr: stderr_output,
    })
}

/// Consume an NDJSON stream, rendering each event.
///
/// Returns the raw line of the last `result` event.
pub fn stream_output<R, F>(
    reader: R,
    mut raw_log: Option<&mut RawLog>,
    mut on_render: F,
) -> Result<Option<String>>
where
    R: Read,
    F: FnMut(&str),
{
    let buf_reader = BufReader::new(reader);
    let mut last_result: Option<String> = None;

    for line in buf_reader.lines() {
        let line = line.context("Failed to read line from stdout")?;

        // Log raw output; a failing log is dropped, the stream keeps going.
        let log_failed = match raw_log.as_deref_mut() {
            Some(log) => match log.write_line(&line) {
                Ok(()) => false,
                Err(e) => {
                    tracing::warn!("raw log {} failed: {}", log.path().display(), e);
                    true
                }
            },
            None => false,
        };
        if log_failed {
            raw_log = None;
        }

        match parser::parse_line(&line) {
            Ok(Some(event)) => {
                if matches!(event, Event::Result(_)) {
                    last_result = Some(line.trim().to_string());
                }
                if let Some(rendered) = formatter::render_event(&event) {
                    on_render(&rendered);
                }
            }
            Ok(None) => {}
            Err(_) => {
                tracing::debug!("skipping non-JSON line: {}", truncate(&line, 100));
            }
        }
    }

    Ok(last_result)
}

/// Drain stderr on a background thread to prevent pipe buffer deadlocks.
///
/// Each line is also logged as it arrives: the agent prints things like its
/// login URL there.
pub fn drain_stderr(stderr: ChildStderr) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
            tracing::warn!("agent stderr: {}", line);
            buf.push_str(&line);
            buf.push('\n');
        }
        buf
    })
}

fn log_exit(status: &ExitStatus) {
    if status.success() {
        tracing::info!("agent exited successfully");
    } else {
        tracing::warn!("agent exited with status: {}", status);
    }
}
