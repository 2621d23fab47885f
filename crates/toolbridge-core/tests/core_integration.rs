#![allow(clippy::unwrap_used, clippy::expect_used)]

use toolbridge_core::*;

// ---------------------------------------------------------------------------
// 1. Every error kind lands on exactly one origin
// ---------------------------------------------------------------------------

#[test]
fn every_error_kind_has_an_origin() {
    let cases = vec![
        (BridgeError::Launch("x".into()), Phase::Handshake, FailureOrigin::Launch),
        (BridgeError::Handshake("x".into()), Phase::Operation, FailureOrigin::Handshake),
        (BridgeError::Protocol("x".into()), Phase::Handshake, FailureOrigin::Protocol),
        (
            BridgeError::Invocation(InvocationError::Rejected("x".into())),
            Phase::Handshake,
            FailureOrigin::Invocation,
        ),
        (BridgeError::TransportClosed("x".into()), Phase::Handshake, FailureOrigin::Handshake),
        (BridgeError::TransportClosed("x".into()), Phase::Operation, FailureOrigin::Protocol),
        (BridgeError::Timeout("x".into()), Phase::Handshake, FailureOrigin::Handshake),
        (BridgeError::Config("x".into()), Phase::Operation, FailureOrigin::Protocol),
    ];

    for (err, phase, expected) in cases {
        let label = err.to_string();
        let failure = err.into_failure(phase);
        assert_eq!(failure.origin, expected, "{label} in {phase:?}");
    }
}

// ---------------------------------------------------------------------------
// 2. Serde errors convert through `?`
// ---------------------------------------------------------------------------

fn parse(input: &str) -> BridgeResult<serde_json::Value> {
    Ok(serde_json::from_str(input)?)
}

#[test]
fn json_errors_propagate_with_question_mark() {
    let err = parse("{not json").unwrap_err();
    assert!(matches!(err, BridgeError::Json(_)));
    assert_eq!(err.into_failure(Phase::Operation).origin, FailureOrigin::Protocol);
}

// ---------------------------------------------------------------------------
// 3. Failure roundtrip through JSON keeps the lowercase origin
// ---------------------------------------------------------------------------

#[test]
fn failure_json_shape() {
    let failure = Failure::invocation("unknown capability: missing");
    let json = serde_json::to_string(&failure).unwrap();
    assert!(json.contains(r#""origin":"invocation""#));
    let back: Failure = serde_json::from_str(&json).unwrap();
    assert_eq!(back, failure);
}
