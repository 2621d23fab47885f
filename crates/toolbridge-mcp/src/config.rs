//! Worker launch configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default time to wait for a single JSON-RPC answer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default time a worker gets to exit after its stdin is closed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// Default time to wait for the process to be reaped after a forceful kill.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// How to start a worker process.
///
/// Built once at startup and shared read-only (`Arc<WorkerConfig>`) by every
/// request. `env` is the complete environment the worker receives; nothing
/// is read from the bridge's own environment at launch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Executable to run.
    pub command: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory of the worker.
    pub working_dir: PathBuf,
    /// Full environment of the worker.
    pub env: BTreeMap<String, String>,
    /// Upper bound for a single protocol request.
    pub request_timeout: Duration,
    /// Grace period for a voluntary exit once stdin is closed.
    pub shutdown_grace: Duration,
    /// Upper bound for reaping the process after a forceful kill.
    pub kill_timeout: Duration,
}

impl WorkerConfig {
    /// A config with no arguments, an empty environment, the current
    /// directory as working directory, and default timeouts.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            env: BTreeMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
        }
    }

    /// Replaces the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the worker's working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Replaces the whole environment.
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = env.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Adds or replaces a single environment entry.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the graceful-exit window.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Sets the wait after a forceful kill.
    pub fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    /// `command arg1 arg2 ...`, for log lines.
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
