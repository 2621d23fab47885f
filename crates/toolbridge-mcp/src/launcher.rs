//! Worker process launcher.

use crate::config::WorkerConfig;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use toolbridge_core::{BridgeError, BridgeResult};
use tracing::{debug, info, warn};

/// How a worker process ended when it was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process exited by itself, with this exit code if it had one.
    Exited(Option<i32>),
    /// The process ignored the grace period and was killed.
    Killed,
    /// The process could not be reaped within the kill timeout.
    Unresponsive,
}

/// Starts worker subprocesses.
pub struct Launcher;

impl Launcher {
    /// Spawn the worker described by `config` with piped stdin/stdout.
    ///
    /// The child gets exactly `config.env` as its environment. It is spawned
    /// with `kill_on_drop`, so a handle dropped without [`WorkerHandle::terminate`]
    /// still does not leave the process running.
    pub fn launch(config: &WorkerConfig) -> BridgeResult<WorkerHandle> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .current_dir(&config.working_dir)
            .env_clear()
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            BridgeError::Launch(format!(
                "failed to spawn worker '{}' in {}: {}",
                config.command,
                config.working_dir.display(),
                e
            ))
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let pid = child.id();

        info!(worker = %config.display_command(), pid = ?pid, "Worker launched");

        Ok(WorkerHandle {
            child,
            pid,
            label: config.command.clone(),
            stdin,
            stdout,
            outcome: None,
        })
    }
}

/// Exclusive owner of one live worker process.
pub struct WorkerHandle {
    child: Child,
    pid: Option<u32>,
    label: String,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    outcome: Option<TerminationOutcome>,
}

impl WorkerHandle {
    /// OS process id, if the process was running when it was spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Command name, used in log lines.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Hand the worker's stdin/stdout to a transport. Succeeds once.
    pub fn take_stdio(&mut self) -> BridgeResult<(ChildStdin, ChildStdout)> {
        match (self.stdin.take(), self.stdout.take()) {
            (Some(stdin), Some(stdout)) => Ok((stdin, stdout)),
            _ => Err(BridgeError::Launch(format!(
                "worker '{}' standard streams not available",
                self.label
            ))),
        }
    }

    /// Whether the process is still running.
    pub fn is_running(&mut self) -> bool {
        self.outcome.is_none() && matches!(self.child.try_wait(), Ok(None))
    }

    /// Stop the worker: wait up to `grace` for it to exit, then kill it and
    /// wait up to `kill_timeout` for it to be reaped.
    ///
    /// Idempotent: later calls return the first outcome without touching
    /// the process again.
    pub async fn terminate(&mut self, grace: Duration, kill_timeout: Duration) -> TerminationOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        let outcome = self.stop(grace, kill_timeout).await;
        debug!(worker = %self.label, pid = ?self.pid, outcome = ?outcome, "Worker terminated");
        self.outcome = Some(outcome);
        outcome
    }

    async fn stop(&mut self, grace: Duration, kill_timeout: Duration) -> TerminationOutcome {
        // Closing stdin is the shutdown signal for stdio servers.
        drop(self.stdin.take());

        match self.child.try_wait() {
            Ok(Some(status)) => return TerminationOutcome::Exited(status.code()),
            Ok(None) => {}
            Err(e) => warn!(worker = %self.label, error = %e, "Failed to poll worker status"),
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => return TerminationOutcome::Exited(status.code()),
            Ok(Err(e)) => warn!(worker = %self.label, error = %e, "Failed to wait for worker"),
            Err(_) => warn!(
                worker = %self.label,
                pid = ?self.pid,
                grace_ms = grace.as_millis() as u64,
                "Worker did not exit within grace period, killing"
            ),
        }

        if let Err(e) = self.child.start_kill() {
            warn!(worker = %self.label, error = %e, "Failed to kill worker");
        }

        match tokio::time::timeout(kill_timeout, self.child.wait()).await {
            Ok(Ok(_)) => TerminationOutcome::Killed,
            Ok(Err(e)) => {
                warn!(worker = %self.label, error = %e, "Failed to reap killed worker");
                TerminationOutcome::Unresponsive
            }
            Err(_) => {
                warn!(worker = %self.label, pid = ?self.pid, "Killed worker was not reaped in time");
                TerminationOutcome::Unresponsive
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_launch_nonexistent_command() {
        let config = WorkerConfig::new("/nonexistent/mcp-worker");
        let err = Launcher::launch(&config).err().unwrap();
        assert!(matches!(err, BridgeError::Launch(_)));
        assert!(err.to_string().contains("/nonexistent/mcp-worker"));
    }

    #[tokio::test]
    async fn test_launch_missing_working_dir() {
        let config = WorkerConfig::new("sh").with_working_dir("/nonexistent/dir/for/worker");
        let err = Launcher::launch(&config).err().unwrap();
        assert!(matches!(err, BridgeError::Launch(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_exits_on_stdin_close() {
        // `cat` exits as soon as its stdin reaches EOF.
        let config = WorkerConfig::new("cat").with_env_var("PATH", "/bin:/usr/bin");
        let mut handle = Launcher::launch(&config).unwrap();
        assert!(handle.is_running());

        let outcome = handle
            .terminate(Duration::from_secs(5), Duration::from_secs(5))
            .await;
        assert_eq!(outcome, TerminationOutcome::Exited(Some(0)));
        assert!(!handle.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_kills_unresponsive_worker() {
        let config = WorkerConfig::new("sleep")
            .with_args(["30"])
            .with_env_var("PATH", "/bin:/usr/bin");
        let mut handle = Launcher::launch(&config).unwrap();

        let started = std::time::Instant::now();
        let outcome = handle
            .terminate(Duration::from_millis(100), Duration::from_secs(5))
            .await;
        assert_eq!(outcome, TerminationOutcome::Killed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let config = WorkerConfig::new("sleep")
            .with_args(["30"])
            .with_env_var("PATH", "/bin:/usr/bin");
        let mut handle = Launcher::launch(&config).unwrap();

        let first = handle
            .terminate(Duration::from_millis(50), Duration::from_secs(5))
            .await;
        let second = handle
            .terminate(Duration::from_millis(50), Duration::from_secs(5))
            .await;
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_take_stdio_only_once() {
        let config = WorkerConfig::new("cat").with_env_var("PATH", "/bin:/usr/bin");
        let mut handle = Launcher::launch(&config).unwrap();
        assert!(handle.take_stdio().is_ok());
        assert!(handle.take_stdio().is_err());
        handle
            .terminate(Duration::from_secs(5), Duration::from_secs(5))
            .await;
    }
}
