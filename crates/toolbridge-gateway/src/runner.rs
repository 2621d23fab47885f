use async_trait::async_trait;
use std::sync::Arc;
use toolbridge_mcp::{Operation, OperationResult, SessionRunner, WorkerConfig};

/// The gateway's only way into the worker lifecycle: one call, one operation.
#[async_trait]
pub trait OperationRunner: Send + Sync {
    /// Serve `operation` and report its outcome.
    async fn run(&self, operation: Operation) -> OperationResult;
}

/// Runs every operation on a freshly launched worker.
pub struct WorkerRunner {
    config: Arc<WorkerConfig>,
}

impl WorkerRunner {
    /// A runner launching workers described by `config`.
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        Self { config }
    }

    /// The worker configuration shared by every request.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

#[async_trait]
impl OperationRunner for WorkerRunner {
    async fn run(&self, operation: Operation) -> OperationResult {
        SessionRunner::new(self.config.clone()).run(operation).await
    }
}
