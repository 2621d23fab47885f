//! HTTP gateway for toolbridge.
//!
//! Exposes a worker's capabilities over HTTP. Every request is served by an
//! [`OperationRunner`]; in production that is [`WorkerRunner`], which
//! launches and tears down one worker per request.

/// API key authentication.
pub mod middleware;
/// The gateway's seam to the worker lifecycle.
pub mod runner;
/// Router and handlers.
pub mod server;

pub use middleware::AuthConfig;
pub use runner::{OperationRunner, WorkerRunner};
pub use server::GatewayServer;
