// file: src/lib.rs
// version: 1.0.0
// guid: fc15b654-e7fc-4d1a-968e-46dc3b7122f6

//! # winrm-exec
//!
//! Runs a single PowerShell command on a remote Windows host over WinRM
//! with NTLM authentication and relays stdout, stderr, and the exit code
//! to the local process.
//!
//! The crate is self-contained: the WS-Management SOAP operations, the
//! NTLM v2 handshake, and the output polling loop are implemented here
//! rather than delegated to an external client library.

pub mod auth;
pub mod cli;
pub mod error;
pub mod logging;
pub mod network;
pub mod protocol;

pub use error::{Result, WinRmError};

/// Version information for the utility
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
