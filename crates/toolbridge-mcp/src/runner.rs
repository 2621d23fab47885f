//! Scoped session runner: one worker, one session, one operation.
//!
//! The runner launches a worker, opens a transport over its standard
//! streams, performs the handshake, runs a single operation and then always
//! closes the transport, which terminates the worker. The body runs on its
//! own task, so dropping the caller's future (a cancelled HTTP request, a
//! timeout) cannot skip the teardown.

use crate::client::McpClient;
use crate::config::WorkerConfig;
use crate::launcher::{Launcher, TerminationOutcome};
use crate::protocol::{CapabilityDescriptor, ClientInfo};
use crate::transport::StdioTransport;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use toolbridge_core::{Failure, Phase};
use tracing::{debug, info, warn};

/// The single logical operation a runner performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    /// Enumerate the worker's capabilities.
    ListCapabilities,
    /// Invoke one capability with structured arguments.
    InvokeCapability {
        /// Capability name; must not be empty.
        name: String,
        /// Arguments object passed through to the worker.
        #[serde(default)]
        arguments: serde_json::Map<String, serde_json::Value>,
    },
}

impl Operation {
    /// Shorthand for [`Operation::InvokeCapability`].
    pub fn invoke(
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self::InvokeCapability {
            name: name.into(),
            arguments,
        }
    }

    fn describe(&self) -> &str {
        match self {
            Self::ListCapabilities => "tools/list",
            Self::InvokeCapability { name, .. } => name,
        }
    }
}

/// Successful result of an [`Operation`].
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    /// Capabilities in the order the worker reported them.
    Capabilities(Vec<CapabilityDescriptor>),
    /// The worker's raw `tools/call` result.
    Invocation(serde_json::Value),
}

impl OperationOutput {
    /// JSON body for clients: `{"tools": [...]}` for a listing, the raw
    /// result for an invocation.
    pub fn into_value(self) -> serde_json::Value {
        match self {
            Self::Capabilities(tools) => serde_json::json!({ "tools": tools }),
            Self::Invocation(value) => value,
        }
    }
}

/// Result of one runner execution.
pub type OperationResult = Result<OperationOutput, Failure>;

/// Lifecycle of a [`SessionRunner`]. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunnerState {
    /// Nothing started yet.
    Idle,
    /// Spawning the worker.
    Launching,
    /// Worker running, transport not yet handshaken.
    Launched,
    /// `initialize` in flight.
    Handshaking,
    /// Session established, operation running.
    Active,
    /// Tearing down the transport and worker.
    Closing,
    /// Done; nothing is left running.
    Terminated,
}

/// Everything a runner observed while serving one operation.
#[derive(Debug)]
pub struct RunReport {
    /// The operation's own result.
    pub result: OperationResult,
    /// Pid of the worker, if one was launched.
    pub worker_pid: Option<u32>,
    /// How the worker ended, if one was launched.
    pub termination: Option<TerminationOutcome>,
    /// States visited, in order.
    pub states: Vec<RunnerState>,
}

impl RunReport {
    /// The last state reached.
    pub fn final_state(&self) -> RunnerState {
        self.states.last().copied().unwrap_or(RunnerState::Idle)
    }
}

/// Serves exactly one [`Operation`] with a freshly launched worker.
///
/// `run` consumes the runner, so a runner can never serve a second
/// operation or re-enter a state.
pub struct SessionRunner {
    config: Arc<WorkerConfig>,
    client_info: ClientInfo,
    states: Vec<RunnerState>,
}

impl SessionRunner {
    /// A runner for one operation against the worker described by `config`.
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        Self {
            config,
            client_info: ClientInfo::default(),
            states: vec![RunnerState::Idle],
        }
    }

    /// Identity announced to the worker during the handshake.
    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.client_info = client_info;
        self
    }

    /// Run `operation` and return its result.
    pub async fn run(self, operation: Operation) -> OperationResult {
        self.run_with_report(operation).await.result
    }

    /// Run `operation` and return the result together with lifecycle details.
    pub async fn run_with_report(self, operation: Operation) -> RunReport {
        match tokio::spawn(self.execute(operation)).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Session task did not complete");
                RunReport {
                    result: Err(Failure::protocol("worker session aborted")),
                    worker_pid: None,
                    termination: None,
                    states: vec![RunnerState::Terminated],
                }
            }
        }
    }

    async fn execute(mut self, operation: Operation) -> RunReport {
        if let Operation::InvokeCapability { name, .. } = &operation {
            if name.trim().is_empty() {
                return self.finish(
                    Err(Failure::invocation("capability name must not be empty")),
                    None,
                    None,
                );
            }
        }

        info!(
            worker = %self.config.command,
            operation = %operation.describe(),
            "Running worker operation"
        );

        self.enter(RunnerState::Launching);
        let handle = match Launcher::launch(&self.config) {
            Ok(handle) => handle,
            Err(e) => return self.finish(Err(e.into_failure(Phase::Handshake)), None, None),
        };
        let pid = handle.pid();
        self.enter(RunnerState::Launched);

        let transport = match StdioTransport::open(handle, &self.config).await {
            Ok(transport) => Arc::new(transport),
            Err(e) => return self.finish(Err(e.into_failure(Phase::Handshake)), pid, None),
        };

        let result = AssertUnwindSafe(self.converse(&transport, operation))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(Failure::protocol("worker session panicked")));

        self.enter(RunnerState::Closing);
        let termination = transport.close().await;
        self.finish(result, pid, Some(termination))
    }

    async fn converse(&mut self, transport: &Arc<StdioTransport>, operation: Operation) -> OperationResult {
        self.enter(RunnerState::Handshaking);
        let client = McpClient::connect(transport.clone(), &self.client_info)
            .await
            .map_err(|e| e.into_failure(Phase::Handshake))?;

        self.enter(RunnerState::Active);
        let output = match operation {
            Operation::ListCapabilities => client
                .list_capabilities()
                .await
                .map(OperationOutput::Capabilities),
            Operation::InvokeCapability { name, arguments } => client
                .invoke(&name, arguments)
                .await
                .map(OperationOutput::Invocation),
        };
        output.map_err(|e| e.into_failure(Phase::Operation))
    }

    fn enter(&mut self, state: RunnerState) {
        if self.states.last().is_some_and(|last| *last >= state) {
            return;
        }
        debug!(state = ?state, "Runner state");
        self.states.push(state);
    }

    fn finish(
        mut self,
        result: OperationResult,
        worker_pid: Option<u32>,
        termination: Option<TerminationOutcome>,
    ) -> RunReport {
        self.enter(RunnerState::Closing);
        self.enter(RunnerState::Terminated);

        match &result {
            Ok(_) => info!(pid = ?worker_pid, termination = ?termination, "Worker operation succeeded"),
            Err(f) => warn!(
                pid = ?worker_pid,
                origin = %f.origin,
                error = %f.message,
                termination = ?termination,
                "Worker operation failed"
            ),
        }

        RunReport {
            result,
            worker_pid,
            termination,
            states: self.states,
        }
    }
}

/// Run one operation against a freshly launched worker.
pub async fn run(config: Arc<WorkerConfig>, operation: Operation) -> OperationResult {
    SessionRunner::new(config).run(operation).await
}
