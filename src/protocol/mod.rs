// file: src/protocol/mod.rs
// version: 1.1.0
// guid: abe55536-8f4e-49dc-b43c-4c67fd70b8a2

//! WS-Management protocol support: envelope construction, response
//! parsing, and CLIXML cleanup.

pub mod clixml;
pub mod envelope;
pub mod response;

pub use envelope::EnvelopeBuilder;
