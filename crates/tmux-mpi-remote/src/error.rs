//! Error types for the remote session bootstrap.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for bootstrap operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur while preparing or launching a remote session.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The work directory (root or host subdirectory) could not be created.
    #[error("could not create work directory {}", path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The local hostname could not be read.
    #[error("could not determine local hostname: {0}")]
    Hostname(#[source] std::io::Error),

    /// The hostname cannot be used as a directory name.
    #[error("invalid hostname for work directory: {0:?}")]
    InvalidHostname(String),

    /// Creating or writing the fingerprint file failed.
    #[error("fingerprint file {} failed", path.display())]
    FingerprintFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external program could not be located on PATH.
    #[error("{tool} not found on PATH")]
    ToolNotFound { tool: String },

    /// The fingerprint tool could not be run or exited unsuccessfully.
    #[error("fingerprint tool {tool} failed: {reason}")]
    FingerprintTool { tool: String, reason: String },

    /// The session backend could not be spawned.
    #[error("failed to start session backend {backend}")]
    SessionLaunch {
        backend: String,
        #[source]
        source: std::io::Error,
    },
}
