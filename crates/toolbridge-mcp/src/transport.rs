//! Newline-delimited JSON-RPC transport over a worker's stdin/stdout.

use crate::config::WorkerConfig;
use crate::launcher::{TerminationOutcome, WorkerHandle};
use crate::protocol::{JsonRpcNotification, JsonRpcReply, JsonRpcRequest, JsonRpcResponse};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use toolbridge_core::{BridgeError, BridgeResult};
use tracing::{debug, error};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;
type SharedStdin = Arc<Mutex<Option<ChildStdin>>>;

/// Upper bound for writing a reply to a worker-initiated request.
const REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// Duplex channel to one worker process. Owns the worker.
///
/// A single reader task routes responses to waiting requests by id and
/// answers requests the worker sends to us (`ping` and nothing else). Lines
/// that are not JSON-RPC, including invalid UTF-8, are skipped. When the
/// worker's stdout ends, every waiting request fails immediately with
/// [`BridgeError::TransportClosed`], as does every request after that.
pub struct StdioTransport {
    label: String,
    pid: Option<u32>,
    stdin: SharedStdin,
    worker: Mutex<WorkerHandle>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    request_timeout: Duration,
    shutdown_grace: Duration,
    kill_timeout: Duration,
}

impl StdioTransport {
    /// Take over `handle` and start reading its stdout.
    ///
    /// If the handle's streams are unavailable the worker is terminated
    /// before the error is returned.
    pub async fn open(mut handle: WorkerHandle, config: &WorkerConfig) -> BridgeResult<Self> {
        let (stdin, stdout) = match handle.take_stdio() {
            Ok(stdio) => stdio,
            Err(e) => {
                handle
                    .terminate(config.shutdown_grace, config.kill_timeout)
                    .await;
                return Err(e);
            }
        };

        let label = handle.label().to_string();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let stdin: SharedStdin = Arc::new(Mutex::new(Some(stdin)));
        let reader = tokio::spawn(read_loop(
            stdout,
            stdin.clone(),
            pending.clone(),
            closed.clone(),
            label.clone(),
        ));

        Ok(Self {
            label,
            pid: handle.pid(),
            stdin,
            worker: Mutex::new(handle),
            pending,
            closed,
            reader: Mutex::new(Some(reader)),
            next_id: AtomicU64::new(1),
            request_timeout: config.request_timeout,
            shutdown_grace: config.shutdown_grace,
            kill_timeout: config.kill_timeout,
        })
    }

    /// Process id of the owned worker.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the channel can no longer carry messages.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a JSON-RPC request and wait for the response with the same id.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> BridgeResult<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.pending.lock().await;
            if self.is_closed() {
                return Err(self.closed_error(method));
            }
            map.insert(id, tx);
        }

        if let Err(e) = self.write_message(&req).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }
        debug!(worker = %self.label, id, method, "Request sent");

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(self.closed_error(method)),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(BridgeError::Timeout(format!(
                    "worker request '{}' timed out after {}ms",
                    method,
                    self.request_timeout.as_millis()
                )))
            }
        }
    }

    /// Send a JSON-RPC notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> BridgeResult<()> {
        if self.is_closed() {
            return Err(self.closed_error(method));
        }
        self.write_message(&JsonRpcNotification::new(method, params))
            .await
    }

    /// Close both directions and terminate the worker.
    ///
    /// Never fails and is safe to call repeatedly; repeated calls report the
    /// outcome of the first termination.
    pub async fn close(&self) -> TerminationOutcome {
        {
            let _map = self.pending.lock().await;
            self.closed.store(true, Ordering::SeqCst);
        }
        drop(self.stdin.lock().await.take());

        let outcome = self
            .worker
            .lock()
            .await
            .terminate(self.shutdown_grace, self.kill_timeout)
            .await;

        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        self.pending.lock().await.clear();

        debug!(worker = %self.label, pid = ?self.pid, outcome = ?outcome, "Transport closed");
        outcome
    }

    async fn write_message<T: Serialize>(&self, message: &T) -> BridgeResult<()> {
        write_line(&self.stdin, message).await
    }

    fn closed_error(&self, method: &str) -> BridgeError {
        BridgeError::TransportClosed(format!(
            "worker '{}' closed its output before answering '{}'",
            self.label, method
        ))
    }
}

async fn write_line<T: Serialize>(stdin: &Mutex<Option<ChildStdin>>, message: &T) -> BridgeResult<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');

    let mut guard = stdin.lock().await;
    let stdin = guard
        .as_mut()
        .ok_or_else(|| BridgeError::TransportClosed("worker stdin already closed".into()))?;

    stdin
        .write_all(&line)
        .await
        .map_err(|e| BridgeError::TransportClosed(format!("failed to write to worker: {e}")))?;
    stdin
        .flush()
        .await
        .map_err(|e| BridgeError::TransportClosed(format!("failed to flush worker stdin: {e}")))?;
    Ok(())
}

async fn read_loop(
    stdout: ChildStdout,
    stdin: SharedStdin,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    label: String,
) {
    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                debug!(worker = %label, "Worker stdout closed");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim_ascii();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_slice::<JsonRpcResponse>(trimmed) {
                    Ok(msg) => match msg.response_id() {
                        Some(id) => {
                            let tx = pending.lock().await.remove(&id);
                            match tx {
                                Some(tx) => {
                                    let _ = tx.send(msg);
                                }
                                None => debug!(worker = %label, id, "Response for unknown request id"),
                            }
                        }
                        None => match msg.worker_request() {
                            Some((id, method)) => {
                                debug!(worker = %label, method, "Answering worker request");
                                let reply = JsonRpcReply::for_worker_request(id.clone(), method);
                                match tokio::time::timeout(REPLY_TIMEOUT, write_line(&stdin, &reply)).await {
                                    Ok(Ok(())) => {}
                                    Ok(Err(e)) => {
                                        debug!(worker = %label, error = %e, "Failed to answer worker request");
                                    }
                                    Err(_) => debug!(worker = %label, "Timed out answering worker request"),
                                }
                            }
                            None => debug!(
                                worker = %label,
                                method = ?msg.method,
                                "Ignoring worker notification"
                            ),
                        },
                    },
                    Err(e) => {
                        debug!(
                            worker = %label,
                            line = %String::from_utf8_lossy(trimmed),
                            error = %e,
                            "Non-JSON-RPC line from worker"
                        );
                    }
                }
            }
            Err(e) => {
                error!(worker = %label, error = %e, "Error reading worker stdout");
                break;
            }
        }
    }

    // Dropping the senders wakes every waiting request.
    let mut map = pending.lock().await;
    closed.store(true, Ordering::SeqCst);
    map.clear();
}
