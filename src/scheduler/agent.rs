//! External agent invocation.
//!
//! The contract with the agent is deliberately small: one prompt string on
//! stdin, exit code plus both output streams back. No structured response
//! format is assumed.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::error::SchedulerError;

/// What came back from one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Seam for driving the external agent; tests substitute a stub.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<AgentOutcome, SchedulerError>;
}

/// Runs the agent as a subprocess, feeding the prompt on stdin.
pub struct ProcessAgent {
    command: String,
    args: Vec<String>,
}

impl ProcessAgent {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl AgentRunner for ProcessAgent {
    async fn run(&self, prompt: &str) -> Result<AgentOutcome, SchedulerError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SchedulerError::Spawn {
                command: self.command.clone(),
                reason: e.to_string(),
            })?;

        // Both streams are drained concurrently while the child runs, so a
        // chatty agent can never fill a pipe and deadlock against us.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(drain(stdout));
        let stderr_task = tokio::spawn(drain(stderr));

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                debug!(error = %e, "Agent closed stdin before reading the full prompt");
            }
            // Dropping stdin sends EOF so the agent knows the prompt is complete.
        }

        let status = child.wait().await.map_err(|e| SchedulerError::Spawn {
            command: self.command.clone(),
            reason: e.to_string(),
        })?;

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        debug!(exit_code = ?status.code(), "Agent process finished");
        Ok(AgentOutcome {
            success: status.success(),
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Read a stream to completion, accumulating incrementally as chunks
/// arrive rather than in one buffer at exit.
async fn drain<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let Some(mut stream) = stream else {
        return String::new();
    };
    let mut collected = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => collected.extend_from_slice(&chunk[..n]),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&collected).into_owned()
}
