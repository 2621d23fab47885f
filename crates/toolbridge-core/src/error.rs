use thiserror::Error;

/// A convenience `Result` alias using [`BridgeError`].
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Top-level error type for the bridge.
///
/// The first four variants name where an operation failed. `TransportClosed`
/// and `Timeout` describe stream conditions whose origin depends on the
/// session phase in which they happened, see [`BridgeError::into_failure`](crate::BridgeError::into_failure).
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The worker subprocess could not be started.
    #[error("Launch error: {0}")]
    Launch(String),

    /// The protocol session could not be established.
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// The worker answered with a protocol-level error or a malformed reply.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The worker refused a capability invocation.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// The worker's standard streams closed unexpectedly.
    #[error("Transport closed: {0}")]
    TransportClosed(String),

    /// A request to the worker received no answer in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the HTTP gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a capability invocation is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// The worker does not advertise a capability with this name.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// The worker rejected the call, usually because the arguments failed validation.
    #[error("rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_error_messages() {
        let unknown = InvocationError::UnknownCapability("missing".into());
        assert_eq!(unknown.to_string(), "unknown capability: missing");

        let rejected = InvocationError::Rejected("text is required".into());
        assert_eq!(rejected.to_string(), "rejected: text is required");
    }

    #[test]
    fn test_invocation_error_is_transparent() {
        let err: BridgeError = InvocationError::UnknownCapability("x".into()).into();
        assert_eq!(err.to_string(), "unknown capability: x");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: BridgeError = io.into();
        assert!(matches!(err, BridgeError::Io(_)));
        assert!(err.to_string().contains("pipe closed"));
    }
}
