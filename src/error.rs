// file: src/error.rs
// version: 1.1.0
// guid: 1a5ed7f2-b24f-404d-b89d-f6119704f6b3

use thiserror::Error;

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, WinRmError>;

/// Exit code for argument errors, matching clap's convention.
pub const EXIT_USAGE: i32 = 2;

/// Exit code when the transport failed before a remote exit code existed.
/// Kept out of the range remote commands commonly report.
pub const EXIT_PROTOCOL_FAILURE: i32 = 255;

/// Error types for the WinRM client
#[derive(Error, Debug)]
pub enum WinRmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Remote fault: {0}")]
    Fault(String),

    /// The transport failed after the remote command produced output.
    /// The captured bytes ride along so the caller can still relay them.
    #[error("{source}")]
    Interrupted {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        #[source]
        source: Box<WinRmError>,
    },
}

impl WinRmError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a new authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

impl From<reqwest::Error> for WinRmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Protocol(err.to_string())
        }
    }
}
