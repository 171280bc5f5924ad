// file: src/logging/mod.rs
// version: 1.0.0
// guid: 4a9634dd-aa39-4021-a995-5b179d43e1c8

//! Logging system for winrm-exec

pub mod logger;

pub use logger::init_logger;
