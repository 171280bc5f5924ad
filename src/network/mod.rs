// file: src/network/mod.rs
// version: 1.1.0
// guid: 45fbbca1-9cb9-44e3-9e58-ff725ec13754

//! Network operations module

pub mod transport;
pub mod winrm;

pub use winrm::{ExecutionResult, WinRmConfig, WinRmSession};
