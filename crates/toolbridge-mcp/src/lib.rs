//! Per-request MCP worker lifecycle.
//!
//! Each operation gets its own worker subprocess: [`Launcher`] spawns it,
//! [`StdioTransport`] frames JSON-RPC over its standard streams, [`McpClient`]
//! speaks the protocol, and [`SessionRunner`] ties them together so the
//! worker is always torn down before a result is returned.

pub mod client;
pub mod config;
pub mod launcher;
pub mod protocol;
pub mod runner;
pub mod transport;

pub use client::McpClient;
pub use config::WorkerConfig;
pub use launcher::{Launcher, TerminationOutcome, WorkerHandle};
pub use protocol::{CapabilityDescriptor, ClientInfo};
pub use runner::{
    run, Operation, OperationOutput, OperationResult, RunReport, RunnerState, SessionRunner,
};
pub use transport::StdioTransport;
