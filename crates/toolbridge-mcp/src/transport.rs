//! Stdio Transport
//!
//! Newline-delimited JSON-RPC over a pair of byte streams (normally the
//! server's stdout and stdin). A background task reads responses and hands
//! each one to the request waiting on its id. Requests from the server are
//! answered: `ping` with an empty result, anything else with "method not found".

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{McpError, Result};
use crate::protocol::{
    IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
};

type Reply = std::result::Result<Value, JsonRpcError>;
type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;
type SharedWriter = Arc<Mutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>>;

/// JSON-RPC client over line-delimited byte streams
pub struct StdioTransport {
    writer: SharedWriter,
    pending: PendingRequests,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    request_timeout: Duration,
}

impl StdioTransport {
    /// Start the reader task on `reader`; requests are written to `writer`.
    pub fn new<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending = PendingRequests::default();
        let closed = Arc::new(AtomicBool::new(false));
        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);
        let writer: SharedWriter = Arc::new(Mutex::new(Some(writer)));

        let reader = tokio::spawn(read_loop(
            BufReader::new(reader),
            Arc::clone(&pending),
            Arc::clone(&writer),
            Arc::clone(&closed),
        ));

        Self {
            writer,
            pending,
            closed,
            next_id: AtomicU64::new(1),
            reader,
            request_timeout,
        }
    }

    /// Send a request and wait for its result
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().await;
            if self.closed.load(Ordering::SeqCst) {
                return Err(McpError::Closed);
            }
            pending.insert(id, tx);
        }

        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        debug!(id, method, "Sending MCP request");

        if let Err(e) = self.write_line(&line).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(McpError::Rpc(error)),
            Ok(Err(_)) => Err(McpError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::Timeout {
                    method: method.to_string(),
                    timeout: self.request_timeout,
                })
            }
        }
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        debug!(method, "Sending MCP notification");
        self.write_line(&line).await
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        write_line(&self.writer, line).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the write side and stop reading; waiting requests fail with
    /// [`McpError::Closed`].
    pub async fn shutdown(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Error closing MCP writer");
            }
        }

        self.reader.abort();
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().await.clear();
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn write_line(writer: &SharedWriter, line: &str) -> Result<()> {
    let mut guard = writer.lock().await;
    let writer = guard.as_mut().ok_or(McpError::Closed)?;

    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn read_loop<R>(
    reader: BufReader<R>,
    pending: PendingRequests,
    writer: SharedWriter,
    closed: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if !line.is_empty() {
                    dispatch(line, &pending, &writer).await;
                }
            }
            Ok(None) => {
                debug!("MCP server closed its output");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read from MCP server");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    // dropping the senders wakes every waiter with `Closed`
    pending.lock().await.clear();
}

async fn dispatch(line: &str, pending: &PendingRequests, writer: &SharedWriter) {
    let message = match serde_json::from_str::<IncomingMessage>(line) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, line, "Ignoring non-JSON-RPC output from MCP server");
            return;
        }
    };

    match message {
        IncomingMessage::Response { id, result, error } => {
            let Some(id) = id.as_u64() else {
                warn!(%id, "Response with non-numeric id");
                return;
            };

            let reply = error.map_or_else(|| Ok(result.unwrap_or(Value::Null)), Err);
            match pending.lock().await.remove(&id) {
                Some(waiter) => {
                    let _ = waiter.send(reply);
                }
                None => warn!(id, "Received response for unknown request ID"),
            }
        }
        IncomingMessage::Notification { method, .. } => {
            debug!(%method, "Received MCP notification");
        }
        IncomingMessage::Request { id, method, .. } => {
            let response = if method == "ping" {
                JsonRpcResponse::success(id, Value::Object(serde_json::Map::new()))
            } else {
                warn!(%method, "Rejecting unsupported request from MCP server");
                JsonRpcResponse::failure(
                    id,
                    JsonRpcError {
                        code: METHOD_NOT_FOUND,
                        message: format!("Method not found: {method}"),
                        data: None,
                    },
                )
            };

            let sent = match serde_json::to_string(&response) {
                Ok(line) => write_line(writer, &line).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = sent {
                debug!(error = %e, "Failed to answer MCP server request");
            }
        }
    }
}
