//! Core error and failure types for the toolbridge workspace.
//!
//! Every crate in the workspace reports problems through [`BridgeError`]. The
//! session runner converts whatever went wrong into a [`Failure`], the only
//! error shape that crosses the boundary towards the HTTP gateway.
//!
//! # Main types
//!
//! - [`BridgeError`]: Unified error enum for launch, protocol and gateway problems.
//! - [`BridgeResult`]: Convenience alias for `Result<T, BridgeError>`.
//! - [`InvocationError`]: Why a capability invocation was refused.
//! - [`Failure`]: Structured, client-presentable failure with a [`FailureOrigin`].
//! - [`Phase`]: Session phase used to classify stream-level errors.

/// Error taxonomy.
pub mod error;
/// Structured failures returned by the session runner.
pub mod failure;

pub use error::{BridgeError, BridgeResult, InvocationError};
pub use failure::{Failure, FailureOrigin, Phase};
