//! Tool server targets
//!
//! A target is a server script path; its suffix picks the launcher.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{McpError, Result};

/// Executable kind of a server script
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerKind {
    Python,
    Node,
}

impl ServerKind {
    /// Fixed launcher command for this kind
    pub const fn launcher(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "py" => Some(Self::Python),
            "js" => Some(Self::Node),
            _ => None,
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Node => write!(f, "node"),
        }
    }
}

/// A tool server script to launch over stdio
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerTarget {
    path: PathBuf,
    kind: ServerKind,
}

impl ServerTarget {
    /// Classify `path` by suffix; anything but `.py` or `.js` is rejected
    /// before any process is started.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let kind = ServerKind::from_path(&path)
            .ok_or_else(|| McpError::UnsupportedTarget(path.display().to_string()))?;

        Ok(Self { path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn kind(&self) -> ServerKind {
        self.kind
    }

    /// Program and arguments used to start the server
    pub fn launch_command(&self) -> (&'static str, Vec<OsString>) {
        (self.kind.launcher(), vec![self.path.clone().into_os_string()])
    }
}

impl FromStr for ServerTarget {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path.display())
    }
}
