// file: src/cli/mod.rs
// version: 1.1.0
// guid: 23afc252-03d8-4bcd-a6c6-3cb5209e1a22

//! Command line interface for winrm-exec

pub mod args;
pub mod commands;

pub use args::Cli;
pub use commands::*;
