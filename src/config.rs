//! Configuration discovery, loading, and resolution.
//!
//! A relay may carry a `.relay.toml` at its project root. This module walks
//! up the directory tree to find it, parses it, and layers CLI flags and
//! environment variables (via `clap`'s `env` support) on top.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::{env, fs};

/// File name looked up from the working directory upwards.
pub const CONFIG_FILE: &str = ".relay.toml";

/// Project configuration loaded from `.relay.toml`.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    /// The directory containing `.relay.toml`, if one was found.
    pub root: Option<PathBuf>,
    /// The parsed configuration (defaults when no file exists).
    pub config: RelayConfig,
}

/// Contents of `.relay.toml`.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8888,
        }
    }
}

/// `[agent]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Shell-style command used to launch the agent CLI.
    pub command: String,
    /// Arguments added to every invocation, ahead of the request's own.
    pub extra_args: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level; `RUST_LOG` overrides it.
    pub level: String,
    /// Whether streaming runs keep a raw NDJSON log.
    pub raw_log: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            raw_log: true,
        }
    }
}

/// Discover the project configuration by walking up from CWD.
///
/// Unlike a missing file, a malformed `.relay.toml` is an error.
pub fn discover() -> Result<ProjectConfig> {
    let cwd = env::current_dir().context("Failed to get current directory")?;
    discover_from(&cwd)
}

/// Discover the project configuration starting from a specific directory.
fn discover_from(start: &Path) -> Result<ProjectConfig> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.is_file() {
            let config = load_config(&config_path)?;
            return Ok(ProjectConfig {
                root: Some(current.to_path_buf()),
                config,
            });
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return Ok(ProjectConfig::default()),
        }
    }
}

/// Load and parse a `.relay.toml` file.
fn load_config(path: &Path) -> Result<RelayConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: RelayConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Agent command string, e.g. `claude` or `npx @anthropic-ai/claude-code`.
    pub agent: String,
    pub extra_args: Vec<String>,
    pub log_level: String,
    pub raw_log: bool,
    /// Directory holding the `.relay.toml` that was loaded, if any.
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Layer command-line overrides on top of the project file.
    ///
    /// Environment variables reach this through `clap`, so a `None` here
    /// means neither the flag nor its variable was set.
    pub fn from_args(
        port: Option<u16>,
        bind: Option<String>,
        agent: Option<String>,
        no_log: bool,
        project: ProjectConfig,
    ) -> Result<Self> {
        let file = project.config;

        let agent = agent.unwrap_or(file.agent.command);
        if agent.trim().is_empty() {
            bail!("agent command is empty");
        }

        let config = Config {
            bind: bind.unwrap_or(file.server.bind),
            port: port.unwrap_or(file.server.port),
            agent,
            extra_args: file.agent.extra_args,
            log_level: file.logging.level,
            raw_log: file.logging.raw_log && !no_log,
            project_root: project.root,
        };
        config.socket_addr()?;
        Ok(config)
    }

    /// Address the HTTP server binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address '{}:{}'", self.bind, self.port))
    }
}
