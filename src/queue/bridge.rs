//! Worker bridge — a long-lived worker process spoken to over JSON lines,
//! one request per line on stdin, one response per line on stdout.
//!
//! Sends are serialized through the rate-limited queue; responses arrive
//! asynchronously and are correlated back to their caller by request id.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::request_queue::RequestQueue;
use crate::error::QueueError;

/// One request line written to the worker's stdin.
#[derive(Debug, Serialize)]
struct WorkerRequest {
    id: Uuid,
    action: String,
    params: Value,
}

/// One response line read from the worker's stdout. Exactly one of
/// `result` and `error` is expected to be set.
#[derive(Debug, Deserialize)]
struct WorkerResponse {
    id: Uuid,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

type Pending = HashMap<Uuid, oneshot::Sender<Result<Value, QueueError>>>;

struct BridgeInner {
    /// `None` once the worker has exited or stdin was closed.
    stdin: Mutex<Option<ChildStdin>>,
    /// Requests sent and still awaiting a response.
    pending: Mutex<Pending>,
}

/// Handle to the worker process. Calls go through [`WorkerBridge::call`].
pub struct WorkerBridge {
    inner: Arc<BridgeInner>,
    queue: RequestQueue,
    timeout: Duration,
}

impl WorkerBridge {
    /// Spawn the worker process and start the queue consumer. The command
    /// string is split on whitespace; the first token is the program.
    pub fn start(command: &str, delay: Duration, timeout: Duration) -> Result<Self, QueueError> {
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty worker command",
            )
            .into());
        };

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let inner = Arc::new(BridgeInner {
            stdin: Mutex::new(stdin),
            pending: Mutex::new(HashMap::new()),
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(line = %line, "Worker stderr");
                }
            });
        }

        // Read responses until EOF, then reap the child and reject
        // whatever is still pending.
        let reader = Arc::clone(&inner);
        tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => reader.handle_line(&line).await,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "Failed reading worker stdout");
                            break;
                        }
                    }
                }
            }
            let code = child.wait().await.ok().and_then(|status| status.code());
            reader.mark_exited(code).await;
        });

        let (queue, _consumer) = RequestQueue::start(delay);
        info!(command = %command, "Worker process started");
        Ok(Self { inner, queue, timeout })
    }

    /// One request/response round trip. The send takes its turn in the
    /// rate-limited queue; the response wait does not, so several requests
    /// can be pending at the worker at once.
    pub async fn call(&self, action: &str, params: Value) -> Result<Value, QueueError> {
        if !self.is_running().await {
            return Err(QueueError::NotRunning);
        }

        let request = WorkerRequest {
            id: Uuid::new_v4(),
            action: action.to_string(),
            params,
        };
        let request_id = request.id;
        let (tx, rx) = oneshot::channel();

        let inner = Arc::clone(&self.inner);
        let sent = self.queue.enqueue(async move {
            inner.send_request(request, tx).await;
        });
        if sent.await.is_err() {
            return Err(QueueError::Closed);
        }

        // The timeout clock starts once the request is on the wire.
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(QueueError::ProcessExited),
            Err(_) => {
                self.inner.pending.lock().await.remove(&request_id);
                warn!(request_id = %request_id, action = %action, "Worker request timed out");
                Err(QueueError::Timeout { seconds: self.timeout.as_secs() })
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.stdin.lock().await.is_some()
    }

    /// Number of requests sent and still awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    /// Close the worker's stdin so it can exit on its own.
    pub async fn stop(&self) {
        self.inner.stdin.lock().await.take();
    }
}

impl BridgeInner {
    /// Runs inside the queue consumer: register the waiter, then write the
    /// request line. Registration comes first so a fast response cannot
    /// race it.
    async fn send_request(&self, request: WorkerRequest, tx: oneshot::Sender<Result<Value, QueueError>>) {
        let request_id = request.id;
        self.pending.lock().await.insert(request_id, tx);
        if let Err(e) = self.write_line(&request).await {
            if let Some(tx) = self.pending.lock().await.remove(&request_id) {
                let _ = tx.send(Err(e));
            }
        }
    }

    async fn write_line(&self, request: &WorkerRequest) -> Result<(), QueueError> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        let Some(stdin) = stdin.as_mut() else {
            return Err(QueueError::NotRunning);
        };
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        debug!(request_id = %request.id, action = %request.action, "Request sent to worker");
        Ok(())
    }

    /// One stdout line: parse it, correlate by id, resolve the waiter.
    /// Junk lines and unknown ids are logged and skipped.
    async fn handle_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let response: WorkerResponse = match serde_json::from_str(line) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, line = %line, "Skipping unparseable worker output");
                return;
            }
        };
        let Some(tx) = self.pending.lock().await.remove(&response.id) else {
            warn!(request_id = %response.id, "Worker response for unknown request");
            return;
        };
        let result = match response.error {
            Some(message) => Err(QueueError::Worker(message)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        let _ = tx.send(result);
    }

    /// The worker is gone: reject everything still pending so no caller is
    /// left holding an unresolvable future.
    async fn mark_exited(&self, code: Option<i32>) {
        self.stdin.lock().await.take();
        let mut pending = self.pending.lock().await;
        let rejected = pending.len();
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(QueueError::ProcessExited));
        }
        warn!(code = ?code, rejected, "Worker process exited");
    }
}
