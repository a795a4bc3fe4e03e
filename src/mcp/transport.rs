//! STDIO transport for the MCP tool server.
//!
//! Spawns the server as a child process and exchanges newline-delimited
//! JSON-RPC 2.0 messages over its stdin/stdout. Responses are matched to
//! requests by id, so a slow call never holds up the others.

use anyhow::{Context, Result};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

static ENV_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env reference pattern"));

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC notification (no id, no response)
#[derive(Debug, Clone, Serialize)]
struct JsonRpcNotification {
    jsonrpc: &'static str,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
struct JsonRpcResponse {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Clone, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Requests waiting for a response, keyed by JSON-RPC id
#[derive(Default)]
struct Inflight {
    pending: DashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    /// Set once the server's stdout is gone
    closed: AtomicBool,
}

/// Removes an abandoned request (e.g. a timed-out call) from the table
struct PendingSlot<'a> {
    inflight: &'a Inflight,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.inflight.pending.remove(&self.id);
    }
}

/// STDIO transport for MCP servers (async)
///
/// Requests may be in flight concurrently. Writes are serialized on stdin
/// and a reader task hands each response to the request with its id.
pub struct StdioTransport {
    child: Mutex<Child>,
    next_id: AtomicU64,
    stdin: Mutex<ChildStdin>,
    inflight: Arc<Inflight>,
    reader: JoinHandle<()>,
}

impl StdioTransport {
    /// Spawn a new MCP server process
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        working_dir: Option<&Path>,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        for (key, value) in env {
            cmd.env(key, expand_env_vars(value));
        }

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn MCP server: {}", command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to get stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to get stdout"))?;

        let inflight = Arc::new(Inflight::default());
        let reader = tokio::spawn(route_responses(BufReader::new(stdout), inflight.clone()));

        Ok(Self {
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            stdin: Mutex::new(stdin),
            inflight,
            reader,
        })
    }

    /// Send a request and wait for its response
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };
        let request_str = serde_json::to_string(&request)?;
        tracing::debug!("MCP request: {}", request_str);

        let (tx, rx) = oneshot::channel();
        self.inflight.pending.insert(id, tx);
        let _slot = PendingSlot {
            inflight: &self.inflight,
            id,
        };
        if self.inflight.closed.load(Ordering::SeqCst) {
            anyhow::bail!("MCP server closed its output");
        }

        {
            let mut stdin = self.stdin.lock().await;
            write_line(&mut stdin, &request_str).await?;
        }

        let response = rx
            .await
            .map_err(|_| anyhow::anyhow!("MCP server closed its output"))?;

        if let Some(error) = response.error {
            anyhow::bail!("MCP error {}: {}", error.code, error.message);
        }

        response
            .result
            .ok_or_else(|| anyhow::anyhow!("MCP response missing result"))
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
        };
        let notification_str = serde_json::to_string(&notification)?;
        tracing::debug!("MCP notification: {}", notification_str);

        let mut stdin = self.stdin.lock().await;
        write_line(&mut stdin, &notification_str).await
    }

    /// Check if the child process is still running
    pub async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    /// Kill the child process
    pub async fn kill(&self) -> Result<()> {
        self.reader.abort();
        let mut child = self.child.lock().await;
        child.kill().await.context("Failed to kill MCP server")?;
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Read server output until EOF, completing pending requests by id
async fn route_responses(mut stdout: BufReader<ChildStdout>, inflight: Arc<Inflight>) {
    let mut line = String::new();
    loop {
        line.clear();
        match stdout.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to read from MCP server: {}", e);
                break;
            }
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        tracing::debug!("MCP response: {}", line);

        let response: JsonRpcResponse = match serde_json::from_str(line) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Skipping unparseable MCP line: {}", e);
                continue;
            }
        };
        // Server-initiated notifications carry no id.
        let Some(id) = response.id else {
            continue;
        };
        match inflight.pending.remove(&id) {
            Some((_, tx)) => {
                let _ = tx.send(response);
            }
            None => tracing::debug!("No pending MCP request for id {}", id),
        }
    }

    tracing::debug!("MCP server output closed");
    inflight.closed.store(true, Ordering::SeqCst);
    // Dropping the senders fails every request still waiting.
    inflight.pending.clear();
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;
    Ok(())
}

/// Expand environment variable references like ${VAR} in a string
fn expand_env_vars(input: &str) -> String {
    ENV_REF
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
