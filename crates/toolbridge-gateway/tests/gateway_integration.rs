#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use toolbridge_core::Failure;
use toolbridge_gateway::{AuthConfig, GatewayServer, OperationRunner};
use toolbridge_mcp::{CapabilityDescriptor, Operation, OperationOutput, OperationResult};

/// Records every operation and answers from a fixed script.
#[derive(Default)]
struct StubRunner {
    seen: Mutex<Vec<Operation>>,
    fail_with: Option<Failure>,
}

impl StubRunner {
    fn failing(failure: Failure) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail_with: Some(failure),
        }
    }
}

#[async_trait]
impl OperationRunner for StubRunner {
    async fn run(&self, operation: Operation) -> OperationResult {
        self.seen.lock().await.push(operation.clone());
        if let Some(failure) = &self.fail_with {
            return Err(failure.clone());
        }
        match operation {
            Operation::ListCapabilities => Ok(OperationOutput::Capabilities(vec![
                descriptor("ping"),
                descriptor("echo"),
            ])),
            Operation::InvokeCapability { arguments, .. } => Ok(OperationOutput::Invocation(
                serde_json::json!({"content": [], "structuredContent": arguments}),
            )),
        }
    }
}

fn descriptor(name: &str) -> CapabilityDescriptor {
    CapabilityDescriptor {
        name: name.to_string(),
        description: format!("{name} tool"),
        input_schema: serde_json::json!({"type": "object"}),
        extra: serde_json::Map::new(),
    }
}

/// Helper: serve the gateway on a random port, returning the address.
async fn start_test_server(runner: Arc<StubRunner>, auth: AuthConfig) -> String {
    let app = GatewayServer::build_with_auth(runner, auth);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let addr_str = format!("127.0.0.1:{}", addr.port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    addr_str
}

#[tokio::test]
async fn test_health_endpoint_does_not_touch_runner() {
    let runner = Arc::new(StubRunner::default());
    let addr = start_test_server(runner.clone(), AuthConfig::default()).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "toolbridge");

    assert!(runner.seen.lock().await.is_empty());
}

#[tokio::test]
async fn test_list_tools() {
    let runner = Arc::new(StubRunner::default());
    let addr = start_test_server(runner.clone(), AuthConfig::default()).await;

    let resp = reqwest::get(format!("http://{addr}/mcp/tools")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ping", "echo"]);

    assert_eq!(*runner.seen.lock().await, vec![Operation::ListCapabilities]);
}

#[tokio::test]
async fn test_call_passes_name_and_arguments() {
    let runner = Arc::new(StubRunner::default());
    let addr = start_test_server(runner.clone(), AuthConfig::default()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/mcp/call"))
        .json(&serde_json::json!({"name": "echo", "arguments": {"text": "hi"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["structuredContent"]["text"], "hi");

    let seen = runner.seen.lock().await;
    assert_eq!(seen.len(), 1);
    match &seen[0] {
        Operation::InvokeCapability { name, arguments } => {
            assert_eq!(name, "echo");
            assert_eq!(arguments["text"], "hi");
        }
        other => panic!("unexpected operation {other:?}"),
    }
}

#[tokio::test]
async fn test_call_without_arguments_sends_empty_object() {
    let runner = Arc::new(StubRunner::default());
    let addr = start_test_server(runner.clone(), AuthConfig::default()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/mcp/call"))
        .json(&serde_json::json!({"name": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let seen = runner.seen.lock().await;
    assert_eq!(seen[0], Operation::invoke("ping", serde_json::Map::new()));
}

#[tokio::test]
async fn test_call_missing_name_is_client_error() {
    let runner = Arc::new(StubRunner::default());
    let addr = start_test_server(runner.clone(), AuthConfig::default()).await;
    let client = reqwest::Client::new();

    for body in [
        serde_json::json!({"arguments": {"text": "hi"}}),
        serde_json::json!({"name": ""}),
        serde_json::json!({}),
    ] {
        let resp = client
            .post(format!("http://{addr}/mcp/call"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "name required");
    }

    // Never reached the core.
    assert!(runner.seen.lock().await.is_empty());
}

#[tokio::test]
async fn test_call_rejects_bad_bodies() {
    let runner = Arc::new(StubRunner::default());
    let addr = start_test_server(runner.clone(), AuthConfig::default()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/mcp/call"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("http://{addr}/mcp/call"))
        .json(&serde_json::json!({"name": "echo", "arguments": [1, 2]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "arguments must be an object");

    assert!(runner.seen.lock().await.is_empty());
}

#[tokio::test]
async fn test_failure_rendered_as_server_error() {
    let runner = Arc::new(StubRunner::failing(Failure::invocation(
        "unknown capability: missing",
    )));
    let addr = start_test_server(runner, AuthConfig::default()).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/mcp/call"))
        .json(&serde_json::json!({"name": "missing"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "unknown capability: missing");
    assert_eq!(body["origin"], "invocation");
}

#[tokio::test]
async fn test_auth_required_for_mcp_routes_only() {
    let runner = Arc::new(StubRunner::default());
    let addr = start_test_server(runner.clone(), AuthConfig::new(vec!["secret".into()])).await;
    let client = reqwest::Client::new();

    // Health stays open.
    let resp = client.get(format!("http://{addr}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("http://{addr}/mcp/tools")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("http://{addr}/mcp/tools"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("http://{addr}/mcp/tools"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("http://{addr}/mcp/tools?api_key=secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    assert_eq!(runner.seen.lock().await.len(), 2);
}
