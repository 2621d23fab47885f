use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the worker lifecycle an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureOrigin {
    /// The worker could not be started.
    Launch,
    /// The protocol session could not be established.
    Handshake,
    /// The worker misbehaved or answered with an error envelope.
    Protocol,
    /// The capability was unknown or the call was rejected.
    Invocation,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Launch => "launch",
            Self::Handshake => "handshake",
            Self::Protocol => "protocol",
            Self::Invocation => "invocation",
        };
        f.write_str(s)
    }
}

/// The session phase an error occurred in.
///
/// Stream-level errors carry no origin of their own; they are attributed to
/// the handshake or to the protocol depending on when they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the session was established.
    Handshake,
    /// While the single logical operation was running.
    Operation,
}

/// A structured failure of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Human-readable reason, safe to show to a client.
    pub message: String,
    /// Lifecycle step that failed.
    pub origin: FailureOrigin,
}

impl Failure {
    /// Creates a failure with the given origin.
    pub fn new(origin: FailureOrigin, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin,
        }
    }

    /// Creates a [`FailureOrigin::Launch`] failure.
    pub fn launch(message: impl Into<String>) -> Self {
        Self::new(FailureOrigin::Launch, message)
    }

    /// Creates a [`FailureOrigin::Handshake`] failure.
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::new(FailureOrigin::Handshake, message)
    }

    /// Creates a [`FailureOrigin::Protocol`] failure.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(FailureOrigin::Protocol, message)
    }

    /// Creates a [`FailureOrigin::Invocation`] failure.
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::new(FailureOrigin::Invocation, message)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.origin, self.message)
    }
}

impl std::error::Error for Failure {}

impl BridgeError {
    /// Classifies this error into a [`Failure`].
    ///
    /// Launch, handshake, protocol and invocation errors keep their own
    /// origin. Everything else is attributed to the phase it happened in.
    pub fn into_failure(self, phase: Phase) -> Failure {
        let by_phase = match phase {
            Phase::Handshake => FailureOrigin::Handshake,
            Phase::Operation => FailureOrigin::Protocol,
        };
        match self {
            Self::Launch(msg) => Failure::launch(msg),
            Self::Handshake(msg) => Failure::handshake(msg),
            Self::Protocol(msg) => Failure::protocol(msg),
            Self::Invocation(err) => Failure::invocation(err.to_string()),
            Self::TransportClosed(msg) => {
                Failure::new(by_phase, format!("worker connection closed: {msg}"))
            }
            Self::Timeout(msg) => Failure::new(by_phase, msg),
            other => Failure::new(by_phase, other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::InvocationError;

    #[test]
    fn test_explicit_origins_ignore_phase() {
        let f = BridgeError::Launch("no such file".into()).into_failure(Phase::Operation);
        assert_eq!(f.origin, FailureOrigin::Launch);
        assert_eq!(f.message, "no such file");

        let f = BridgeError::Protocol("bad".into()).into_failure(Phase::Handshake);
        assert_eq!(f.origin, FailureOrigin::Protocol);

        let f = BridgeError::Invocation(InvocationError::UnknownCapability("missing".into()))
            .into_failure(Phase::Operation);
        assert_eq!(f.origin, FailureOrigin::Invocation);
        assert_eq!(f.message, "unknown capability: missing");
    }

    #[test]
    fn test_transport_closed_classified_by_phase() {
        let during_handshake =
            BridgeError::TransportClosed("eof".into()).into_failure(Phase::Handshake);
        assert_eq!(during_handshake.origin, FailureOrigin::Handshake);

        let during_operation =
            BridgeError::TransportClosed("eof".into()).into_failure(Phase::Operation);
        assert_eq!(during_operation.origin, FailureOrigin::Protocol);
        assert!(during_operation.message.contains("eof"));
    }

    #[test]
    fn test_timeout_classified_by_phase() {
        let f = BridgeError::Timeout("tools/call timed out".into()).into_failure(Phase::Operation);
        assert_eq!(f.origin, FailureOrigin::Protocol);
        assert_eq!(f.message, "tools/call timed out");
    }

    #[test]
    fn test_failure_serialization() {
        let f = Failure::handshake("worker exited");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["origin"], "handshake");
        assert_eq!(json["message"], "worker exited");
        assert_eq!(f.to_string(), "handshake failure: worker exited");
    }
}
