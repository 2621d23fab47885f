//! Scriptable MCP stdio worker for the end-to-end tests.
//!
//! Behaviour is driven by environment variables:
//!
//! - `FAKE_WORKER_TOOLS`: comma-separated tool names to advertise (default `ping,echo`).
//! - `FAKE_WORKER_MODE`: `normal`, `exit_early` (exit before reading anything),
//!   `refuse_handshake` (error reply to `initialize`), `ignore_eof` (keep
//!   running after stdin closes) or `chatty` (before answering `initialize`,
//!   print a non-UTF-8 line and ping the client, exiting unless it answers).
//! - `FAKE_WORKER_PAGE_SIZE`: split `tools/list` into pages of this size.
//! - `FAKE_WORKER_LOG`: file to append `pid<TAB>method<TAB>tool` lines to.
//!
//! Tools: `ping` answers `pong`; `echo` returns its arguments (requires a
//! string `text`); `explode` answers with a JSON-RPC internal error; `fail`
//! returns an `isError` result; `slow` sleeps `ms` milliseconds first.

use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::time::Duration;

fn main() {
    let mode = std::env::var("FAKE_WORKER_MODE").unwrap_or_else(|_| "normal".into());
    if mode == "exit_early" {
        std::process::exit(3);
    }

    let tools: Vec<String> = std::env::var("FAKE_WORKER_TOOLS")
        .unwrap_or_else(|_| "ping,echo".into())
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    let page_size = std::env::var("FAKE_WORKER_PAGE_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(usize::MAX);

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    while let Some(line) = lines.next() {
        let Ok(line) = line else { break };
        let Ok(msg) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let method = msg["method"].as_str().unwrap_or_default().to_string();
        let tool = msg["params"]["name"].as_str().unwrap_or_default().to_string();
        record(&method, &tool);

        let Some(id) = msg.get("id").cloned() else {
            continue; // notification
        };

        let reply = match method.as_str() {
            "initialize" if mode == "refuse_handshake" => error(id, -32600, "handshake refused"),
            "initialize" if mode == "chatty" && !ping_client(&mut lines) => std::process::exit(4),
            "initialize" => {
                // Unsolicited traffic the client has to skip.
                send(&json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info", "data": "starting"}}));
                result(
                    id,
                    json!({
                        "protocolVersion": "2024-11-05",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "fake-mcp-worker", "version": "0.1.0"}
                    }),
                )
            }
            "tools/list" => {
                let start = msg["params"]["cursor"]
                    .as_str()
                    .and_then(|c| c.parse::<usize>().ok())
                    .unwrap_or(0);
                let end = start.saturating_add(page_size).min(tools.len());
                let page: Vec<Value> = tools[start.min(end)..end]
                    .iter()
                    .map(|name| {
                        json!({
                            "name": name,
                            "description": format!("{name} tool"),
                            "inputSchema": {"type": "object", "properties": {}}
                        })
                    })
                    .collect();
                let mut body = json!({ "tools": page });
                if end < tools.len() {
                    body["nextCursor"] = json!(end.to_string());
                }
                result(id, body)
            }
            "tools/call" => call_tool(id, &tools, &tool, &msg["params"]["arguments"]),
            _ => error(id, -32601, "method not found"),
        };
        send(&reply);
    }

    if mode == "ignore_eof" {
        loop {
            std::thread::sleep(Duration::from_secs(3600));
        }
    }
}

/// Emit junk bytes, then ping the client and wait for an empty result.
fn ping_client(lines: &mut impl Iterator<Item = std::io::Result<String>>) -> bool {
    {
        let mut out = std::io::stdout().lock();
        if out.write_all(b"\xff\xfe banner\n").and_then(|_| out.flush()).is_err() {
            return false;
        }
    }
    send(&json!({"jsonrpc": "2.0", "id": "srv-1", "method": "ping"}));

    let Some(Ok(reply)) = lines.next() else {
        return false;
    };
    let Ok(reply) = serde_json::from_str::<Value>(&reply) else {
        return false;
    };
    record("ping-reply", "");
    reply["id"] == "srv-1" && reply["result"] == json!({})
}

fn call_tool(id: Value, tools: &[String], name: &str, arguments: &Value) -> Value {
    if !tools.iter().any(|t| t == name) {
        return error(id, -32602, &format!("Unknown tool: {name}"));
    }
    match name {
        "ping" => result(id, text_result("pong")),
        "echo" => match arguments["text"].as_str() {
            Some(text) => {
                let mut body = text_result(text);
                body["structuredContent"] = arguments.clone();
                result(id, body)
            }
            None => error(id, -32602, "text is required"),
        },
        "explode" => error(id, -32603, "worker exploded"),
        "fail" => result(
            id,
            json!({"content": [{"type": "text", "text": "tool failed"}], "isError": true}),
        ),
        "slow" => {
            let ms = arguments["ms"].as_u64().unwrap_or(1000);
            std::thread::sleep(Duration::from_millis(ms));
            result(id, text_result("done"))
        }
        _ => result(id, text_result(name)),
    }
}

fn text_result(text: &str) -> Value {
    json!({"content": [{"type": "text", "text": text}], "isError": false})
}

fn result(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn error(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

fn send(message: &Value) {
    let mut out = std::io::stdout().lock();
    if writeln!(out, "{message}").and_then(|_| out.flush()).is_err() {
        std::process::exit(1);
    }
}

fn record(method: &str, tool: &str) {
    let Ok(path) = std::env::var("FAKE_WORKER_LOG") else {
        return;
    };
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        let _ = writeln!(file, "{}\t{method}\t{tool}", std::process::id());
    }
}
