//! MCP client session
//!
//! Owns one tool-server connection for its whole lifetime: launch and
//! handshake, tool listing and invocation, and release.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use toolbridge_core::tool::joined_text;
use toolbridge_core::{BridgeError, ContentBlock, Result, ToolDescriptor, ToolRunner};

use crate::error::McpError;
use crate::protocol::{CallToolResult, Implementation, InitializeResult, PROTOCOL_VERSION, ToolsListResult};
use crate::target::ServerTarget;
use crate::transport::StdioTransport;

/// Session settings
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Name reported in `clientInfo`
    pub client_name: String,

    /// Version reported in `clientInfo`
    pub client_version: String,

    /// Per-request timeout on the transport
    pub request_timeout: Duration,

    /// How long `close` waits for the server to exit before killing it
    pub shutdown_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_name: "toolbridge".into(),
            client_version: env!("CARGO_PKG_VERSION").into(),
            request_timeout: Duration::from_secs(180),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// A live connection to one MCP tool server
pub struct McpSession {
    transport: StdioTransport,
    child: Mutex<Option<Child>>,
    server: Implementation,
    closed: AtomicBool,
    shutdown_grace: Duration,
}

impl McpSession {
    /// Launch the server for `target` and complete the MCP handshake.
    ///
    /// Any failure is a [`BridgeError::Connection`]; the process is torn down
    /// before returning.
    pub async fn connect(target: &ServerTarget, config: &SessionConfig) -> Result<Self> {
        let (program, args) = target.launch_command();
        info!(%target, "Launching MCP server");

        let mut command = Command::new(program);
        command.args(&args);
        Self::spawn(command, config).await
    }

    /// Start `command` as the server process and handshake over its stdio
    async fn spawn(mut command: Command, config: &SessionConfig) -> Result<Self> {
        let program = command.as_std().get_program().to_string_lossy().into_owned();
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::Connection(format!("failed to launch `{program}`: {e}")))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(BridgeError::Connection("server stdio was not captured".into()));
        };

        let transport = StdioTransport::new(stdout, stdin, config.request_timeout);
        Self::establish(transport, Some(child), config).await
    }

    /// Handshake over an already-connected transport (no child process)
    pub async fn from_transport(transport: StdioTransport, config: &SessionConfig) -> Result<Self> {
        Self::establish(transport, None, config).await
    }

    async fn establish(transport: StdioTransport, child: Option<Child>, config: &SessionConfig) -> Result<Self> {
        let mut session = Self {
            transport,
            child: Mutex::new(child),
            server: Implementation::default(),
            closed: AtomicBool::new(false),
            shutdown_grace: config.shutdown_grace,
        };

        match session.initialize(config).await {
            Ok(init) => {
                info!(
                    server = %init.server_info.name,
                    version = %init.server_info.version,
                    protocol = %init.protocol_version,
                    "Connected to MCP server"
                );
                session.server = init.server_info;
                Ok(session)
            }
            Err(e) => {
                session.close().await;
                Err(BridgeError::Connection(format!("handshake failed: {e}")))
            }
        }
    }

    async fn initialize(&self, config: &SessionConfig) -> std::result::Result<InitializeResult, McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": config.client_name,
                "version": config.client_version,
            }
        });

        let value = self.transport.request("initialize", Some(params)).await?;
        let init: InitializeResult = serde_json::from_value(value)?;

        if init.protocol_version != PROTOCOL_VERSION {
            debug!(server = %init.protocol_version, client = PROTOCOL_VERSION, "Protocol version differs");
        }

        self.transport.notify("notifications/initialized", None).await?;
        Ok(init)
    }

    /// Server name and version from the handshake
    pub const fn server_info(&self) -> &Implementation {
        &self.server
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BridgeError::Transport("session is closed".into()));
        }
        Ok(())
    }

    /// Query the tool catalog, following pagination
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_open()?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let value = self.transport.request("tools/list", params).await?;
            let page: ToolsListResult = serde_json::from_value(value)?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    /// Invoke `name` with `arguments`.
    ///
    /// Server-side errors (unknown tool, `isError` results) come back as
    /// [`BridgeError::ToolInvocation`].
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Vec<ContentBlock>> {
        self.ensure_open()?;

        let params = json!({ "name": name, "arguments": arguments });
        let value = self
            .transport
            .request("tools/call", Some(params))
            .await
            .map_err(|e| match e {
                McpError::Rpc(error) => BridgeError::tool_invocation(name, error.message),
                other => other.into(),
            })?;

        let result: CallToolResult = serde_json::from_value(value)?;
        if result.is_error {
            let text = joined_text(&result.content);
            let cause = if text.is_empty() {
                "tool reported an error".to_string()
            } else {
                text
            };
            return Err(BridgeError::tool_invocation(name, cause));
        }

        Ok(result.content)
    }

    /// Release the transport and the server process. Safe to call repeatedly.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.transport.shutdown().await;

        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };

        // closing stdin asks the server to exit; give it a moment first
        match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "MCP server exited"),
            Ok(Err(e)) => warn!(error = %e, "Failed to wait for MCP server"),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill MCP server");
                } else {
                    debug!("MCP server killed after shutdown grace period");
                }
            }
        }

        info!("MCP session closed");
    }
}

#[async_trait]
impl ToolRunner for McpSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Self::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Vec<ContentBlock>> {
        Self::call_tool(self, name, arguments).await
    }
}
