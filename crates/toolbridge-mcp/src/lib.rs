//! # toolbridge-mcp
//!
//! Client side of the Model Context Protocol over stdio.
//!
//! A [`McpSession`] launches a tool-server script as a child process,
//! performs the `initialize` handshake and then serves `tools/list` and
//! `tools/call` through the [`toolbridge_core::ToolRunner`] trait.
//!
//! ```rust,ignore
//! let target = ServerTarget::new("server.py")?;
//! let session = McpSession::connect(&target, &SessionConfig::default()).await?;
//! let tools = session.list_tools().await?;
//! session.close().await;
//! ```

pub mod error;
pub mod protocol;
pub mod session;
pub mod target;
pub mod transport;

pub use error::McpError;
pub use protocol::{Implementation, PROTOCOL_VERSION};
pub use session::{McpSession, SessionConfig};
pub use target::{ServerKind, ServerTarget};
pub use transport::StdioTransport;
