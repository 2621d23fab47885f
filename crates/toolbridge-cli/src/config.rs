//! Startup configuration.
//!
//! Resolved once, in increasing precedence: built-in defaults, the optional
//! TOML file, environment variables (a `.env` file has already been merged
//! into the process environment by then), command-line flags. The result is
//! never modified afterwards.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use toolbridge_core::{BridgeError, BridgeResult};
use toolbridge_mcp::WorkerConfig;

pub const DEFAULT_COMMAND: &str = "uvx";
pub const DEFAULT_ARGS: &str =
    "--from git+https://github.com/Azure-Samples/azure-ai-vision-face-api-mcp-server azure-face-mcp";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    worker: WorkerSection,
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkerSection {
    command: Option<String>,
    args: Option<Vec<String>>,
    cwd: Option<PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    request_timeout_secs: Option<u64>,
    shutdown_grace_ms: Option<u64>,
    kill_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    #[serde(default)]
    api_keys: Vec<String>,
}

/// Where the gateway listens and who may call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_keys: Vec<String>,
}

/// Everything the process needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub worker: WorkerConfig,
    pub server: ServerConfig,
}

impl BridgeConfig {
    /// Read the optional TOML file and snapshot the process environment.
    pub async fn load(path: Option<&Path>, default_cwd: PathBuf) -> BridgeResult<Self> {
        let file = match path {
            Some(path) => Some(tokio::fs::read_to_string(path).await.map_err(|e| {
                BridgeError::Config(format!(
                    "failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?),
            None => None,
        };
        let vars: BTreeMap<String, String> = std::env::vars().collect();
        Self::resolve(file.as_deref(), vars, default_cwd)
    }

    /// Combine defaults, TOML text and an environment snapshot.
    ///
    /// `vars` also becomes the worker's environment, with `[worker.env]`
    /// entries from the file layered on top.
    pub fn resolve(
        file: Option<&str>,
        vars: BTreeMap<String, String>,
        default_cwd: PathBuf,
    ) -> BridgeResult<Self> {
        let file: FileConfig = match file {
            Some(text) => toml::from_str(text)
                .map_err(|e| BridgeError::Config(format!("invalid config file: {e}")))?,
            None => FileConfig::default(),
        };
        let FileConfig { worker: w, server: s } = file;

        let command = vars
            .get("MCP_COMMAND")
            .cloned()
            .or(w.command)
            .unwrap_or_else(|| DEFAULT_COMMAND.to_string());

        let args = match vars.get("MCP_ARGS") {
            Some(raw) => split_args(raw),
            None => w.args.unwrap_or_else(|| split_args(DEFAULT_ARGS)),
        };

        let working_dir = vars
            .get("MCP_CWD")
            .map(PathBuf::from)
            .or(w.cwd)
            .unwrap_or(default_cwd);

        let request_timeout = parse_var::<u64>(&vars, "MCP_REQUEST_TIMEOUT_SECS")?
            .or(w.request_timeout_secs)
            .map(Duration::from_secs);
        let shutdown_grace = parse_var::<u64>(&vars, "MCP_SHUTDOWN_GRACE_MS")?
            .or(w.shutdown_grace_ms)
            .map(Duration::from_millis);
        let kill_timeout = parse_var::<u64>(&vars, "MCP_KILL_TIMEOUT_MS")?
            .or(w.kill_timeout_ms)
            .map(Duration::from_millis);

        let host = vars
            .get("MCP_BRIDGE_HOST")
            .cloned()
            .or(s.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_var::<u16>(&vars, "MCP_BRIDGE_PORT")?
            .or(s.port)
            .unwrap_or(DEFAULT_PORT);
        let api_keys = match vars.get("MCP_BRIDGE_API_KEYS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
            None => s.api_keys,
        };

        let mut env = vars;
        env.extend(w.env);

        let mut worker = WorkerConfig::new(command)
            .with_args(args)
            .with_working_dir(working_dir)
            .with_env(env);
        if let Some(timeout) = request_timeout {
            worker = worker.with_request_timeout(timeout);
        }
        if let Some(grace) = shutdown_grace {
            worker = worker.with_shutdown_grace(grace);
        }
        if let Some(timeout) = kill_timeout {
            worker = worker.with_kill_timeout(timeout);
        }

        Ok(Self {
            worker,
            server: ServerConfig {
                host,
                port,
                api_keys,
            },
        })
    }
}

fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(String::from).collect()
}

fn parse_var<T: FromStr>(vars: &BTreeMap<String, String>, key: &str) -> BridgeResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match vars.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| BridgeError::Config(format!("invalid {key} '{raw}': {e}"))),
    }
}
