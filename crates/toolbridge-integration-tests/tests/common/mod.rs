//! Shared helpers for driving the fake MCP worker.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use toolbridge_mcp::WorkerConfig;

pub const WORKER_BIN: &str = env!("CARGO_BIN_EXE_fake-mcp-worker");

/// Worker config pointing at the fake worker, recording requests to `log`.
pub fn worker_config(log: &Path) -> WorkerConfig {
    WorkerConfig::new(WORKER_BIN)
        .with_env_var("FAKE_WORKER_LOG", log.display().to_string())
        .with_request_timeout(Duration::from_secs(10))
        .with_shutdown_grace(Duration::from_millis(500))
        .with_kill_timeout(Duration::from_secs(5))
}

pub fn shared(config: WorkerConfig) -> Arc<WorkerConfig> {
    Arc::new(config)
}

pub fn args(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// One request line recorded by the fake worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub pid: u32,
    pub method: String,
    pub tool: String,
}

pub fn read_log(log: &Path) -> Vec<Recorded> {
    let Ok(text) = std::fs::read_to_string(log) else {
        return Vec::new();
    };
    text.lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            Some(Recorded {
                pid: parts.next()?.parse().ok()?,
                method: parts.next()?.to_string(),
                tool: parts.next().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

pub fn calls(log: &Path) -> Vec<Recorded> {
    read_log(log)
        .into_iter()
        .filter(|r| r.method == "tools/call")
        .collect()
}

/// Pids of workers that handled each tool call.
pub fn call_pids(log: &Path) -> BTreeMap<String, Vec<u32>> {
    let mut out: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for r in calls(log) {
        out.entry(r.tool).or_default().push(r.pid);
    }
    out
}

#[cfg(target_os = "linux")]
pub fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
pub fn process_alive(_pid: u32) -> bool {
    false
}

/// Wait until `pid` no longer exists, panicking after `within`.
pub async fn assert_gone_within(pid: u32, within: Duration) {
    let deadline = Instant::now() + within;
    while process_alive(pid) {
        assert!(
            Instant::now() < deadline,
            "worker {pid} still running after {within:?}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
