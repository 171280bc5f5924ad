// file: src/auth/mod.rs
// version: 1.0.0
// guid: e35a9db4-cb1c-441a-9183-1d0cd14e4653

//! NTLM authentication for the WinRM transport

pub mod credentials;
pub mod ntlm;

pub use credentials::Credentials;
pub use ntlm::NtlmAuthenticator;
