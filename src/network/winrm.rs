// file: src/network/winrm.rs
// version: 1.1.0
// guid: 2d0d5ec0-a4ca-4fd3-b7d5-d09b6d996578

//! WinRM shell sessions
//!
//! A session drives the five shell operations against one endpoint:
//! create the shell, start the command, poll `Receive` until the command
//! state turns Done, signal terminate, delete the shell. Signal and
//! delete run on every path so the server is never left holding a shell.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};
use url::Url;

use crate::auth::ntlm::utf16le;
use crate::auth::{Credentials, NtlmAuthenticator};
use crate::network::transport::{HttpTransport, SoapResponse};
use crate::protocol::clixml::clean_error_stream;
use crate::protocol::envelope::EnvelopeBuilder;
use crate::protocol::response::{
    extract_command_id, extract_shell_id, parse_fault, parse_receive_response, SoapFault,
    FAULT_OPERATION_TIMEOUT,
};
use crate::{Result, WinRmError};

/// Port of the default HTTP WinRM listener.
pub const DEFAULT_PORT: u16 = 5985;

/// Connection settings for one WinRM endpoint.
#[derive(Debug, Clone)]
pub struct WinRmConfig {
    pub host: String,
    pub port: u16,
    /// TCP connect budget.
    pub connect_timeout: Duration,
    /// Whole-request budget. Must stay above the operation timeout or
    /// idle output polls get cut off mid-flight.
    pub read_timeout: Duration,
    /// Server-side wait advertised in every envelope, in seconds.
    pub operation_timeout_secs: u64,
    /// OEM codepage the remote shell encodes output with.
    pub codepage: u32,
}

impl Default for WinRmConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            operation_timeout_secs: 20,
            codepage: 437,
        }
    }
}

impl WinRmConfig {
    /// Parse a target given as `host` or `host:port`. IPv6 literals are
    /// accepted bracketed or bare; only the bracketed form can carry a
    /// port.
    pub fn for_host(raw: &str) -> Result<Self> {
        let (host, port) = split_host_port(raw)?;
        let config = Self {
            host,
            port,
            ..Self::default()
        };
        Url::parse(&config.endpoint_url())
            .map_err(|e| WinRmError::config(format!("Invalid host {:?}: {}", raw, e)))?;
        Ok(config)
    }

    /// URL of the WinRM listener.
    pub fn endpoint_url(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}/wsman", self.host, self.port)
        } else {
            format!("http://{}:{}/wsman", self.host, self.port)
        }
    }
}

fn split_host_port(raw: &str) -> Result<(String, u16)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(WinRmError::config("Host must not be empty"));
    }

    if let Some(rest) = raw.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| WinRmError::config(format!("Unbalanced bracket in host {:?}", raw)))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host.to_string(), parse_port(port)?)),
            None if tail.is_empty() => Ok((host.to_string(), DEFAULT_PORT)),
            None => Err(WinRmError::config(format!(
                "Unexpected text after bracketed host in {:?}",
                raw
            ))),
        };
    }

    match raw.split_once(':') {
        None => Ok((raw.to_string(), DEFAULT_PORT)),
        Some((host, port)) if !port.contains(':') => Ok((host.to_string(), parse_port(port)?)),
        // More than one colon: a bare IPv6 literal, no port attached.
        Some(_) => Ok((raw.to_string(), DEFAULT_PORT)),
    }
}

fn parse_port(value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .map_err(|_| WinRmError::config(format!("Invalid port {:?}", value)))
}

/// Captured output and exit code of one remote command.
#[derive(Debug)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ExecutionResult {
    /// True when the remote process reported exit code zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One WinRM endpoint with credentials attached, ready to run commands.
pub struct WinRmSession {
    config: WinRmConfig,
    transport: HttpTransport,
    envelopes: EnvelopeBuilder,
}

impl WinRmSession {
    /// Prepare a session for `config` using `credentials`.
    ///
    /// No network traffic happens here; the endpoint is first contacted
    /// when a command runs.
    pub fn connect(config: WinRmConfig, credentials: Credentials) -> Result<Self> {
        let authenticator = NtlmAuthenticator::new(credentials);
        let transport = HttpTransport::new(&config, authenticator)?;
        let envelopes = EnvelopeBuilder::new(
            &config.endpoint_url(),
            config.operation_timeout_secs,
            config.codepage,
        );
        debug!(host = %config.host, port = config.port, "session prepared");
        Ok(Self {
            config,
            transport,
            envelopes,
        })
    }

    /// Run a PowerShell script and capture its output.
    ///
    /// The script ships base64 encoded so its quoting survives the
    /// remote command line, and a CLIXML-wrapped error stream comes back
    /// cleaned into readable text.
    pub async fn run_powershell(&self, script: &str) -> Result<ExecutionResult> {
        let encoded = BASE64.encode(utf16le(script));
        match self
            .run_command("powershell", &["-encodedcommand", &encoded])
            .await
        {
            Ok(mut result) => {
                if !result.stderr.is_empty() {
                    result.stderr = clean_error_stream(&result.stderr);
                }
                Ok(result)
            }
            Err(WinRmError::Interrupted {
                stdout,
                stderr,
                source,
            }) => Err(WinRmError::Interrupted {
                stdout,
                stderr: clean_error_stream(&stderr),
                source,
            }),
            Err(err) => Err(err),
        }
    }

    /// Run a bare command in a fresh remote shell.
    pub async fn run_command(&self, command: &str, args: &[&str]) -> Result<ExecutionResult> {
        debug!(host = %self.config.host, %command, "running remote command");
        let shell_id = self.open_shell().await?;
        let result = self.run_in_shell(&shell_id, command, args).await;
        self.close_shell(&shell_id).await;
        result
    }

    async fn run_in_shell(
        &self,
        shell_id: &str,
        command: &str,
        args: &[&str],
    ) -> Result<ExecutionResult> {
        let body = self
            .roundtrip(&self.envelopes.start_command(shell_id, command, args))
            .await?;
        let command_id = extract_command_id(&body)?;
        debug!(%command_id, "command started");

        let outcome = self.drain_output(shell_id, &command_id).await;
        self.signal_terminate(shell_id, &command_id).await;
        outcome
    }

    /// Poll `Receive` until the command state turns Done, accumulating
    /// stream bytes in arrival order. Idle-poll faults restart the poll;
    /// any other failure carries the bytes gathered so far.
    async fn drain_output(&self, shell_id: &str, command_id: &str) -> Result<ExecutionResult> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code: Option<i32> = None;

        loop {
            let envelope = self.envelopes.receive_output(shell_id, command_id);
            let response = match self.transport.send(&envelope).await {
                Ok(response) => response,
                Err(err) => return Err(interrupted(stdout, stderr, err)),
            };

            if let Some(fault) = parse_fault(&response.body) {
                if fault.code == Some(FAULT_OPERATION_TIMEOUT) {
                    debug!("receive poll idled out, reissuing");
                    continue;
                }
                return Err(interrupted(stdout, stderr, fault_error(fault)));
            }
            if !response.status.is_success() {
                return Err(interrupted(stdout, stderr, http_error(&response)));
            }

            let chunk = match parse_receive_response(&response.body) {
                Ok(chunk) => chunk,
                Err(err) => return Err(interrupted(stdout, stderr, err)),
            };
            stdout.extend_from_slice(&chunk.stdout);
            stderr.extend_from_slice(&chunk.stderr);
            if chunk.exit_code.is_some() {
                exit_code = chunk.exit_code;
            }

            if chunk.done {
                let exit_code = exit_code.unwrap_or_else(|| {
                    warn!("command finished without an exit code, assuming 0");
                    0
                });
                debug!(exit_code, "command finished");
                return Ok(ExecutionResult {
                    stdout,
                    stderr,
                    exit_code,
                });
            }
        }
    }

    async fn open_shell(&self) -> Result<String> {
        let body = self.roundtrip(&self.envelopes.create_shell()).await?;
        let shell_id = extract_shell_id(&body)?;
        debug!(%shell_id, "shell created");
        Ok(shell_id)
    }

    /// Best effort. A command that is already Done ignores the signal,
    /// but one aborted mid-stream must be told to stop.
    async fn signal_terminate(&self, shell_id: &str, command_id: &str) {
        match self
            .roundtrip(&self.envelopes.signal_terminate(shell_id, command_id))
            .await
        {
            Ok(_) => debug!(%command_id, "command signalled"),
            Err(err) => warn!(%command_id, error = %err, "failed to signal command"),
        }
    }

    /// Best effort. A shell that is never deleted pins server resources
    /// until the service reaps it on its own schedule.
    async fn close_shell(&self, shell_id: &str) {
        match self.roundtrip(&self.envelopes.delete_shell(shell_id)).await {
            Ok(_) => debug!(%shell_id, "shell deleted"),
            Err(err) => warn!(%shell_id, error = %err, "failed to delete shell"),
        }
    }

    async fn roundtrip(&self, envelope: &str) -> Result<String> {
        let response = self.transport.send(envelope).await?;
        check_soap(response)
    }
}

fn check_soap(response: SoapResponse) -> Result<String> {
    if let Some(fault) = parse_fault(&response.body) {
        return Err(fault_error(fault));
    }
    if !response.status.is_success() {
        return Err(http_error(&response));
    }
    Ok(response.body)
}

fn http_error(response: &SoapResponse) -> WinRmError {
    WinRmError::Protocol(format!(
        "Unexpected HTTP status {} from WinRM endpoint",
        response.status
    ))
}

fn fault_error(fault: SoapFault) -> WinRmError {
    match fault.code {
        Some(code) => WinRmError::Fault(format!("WSManFault {}: {}", code, fault.message)),
        None => WinRmError::Fault(fault.message),
    }
}

/// Wrap a transport failure together with whatever output was already
/// captured. With nothing captured the cause passes through untouched.
fn interrupted(stdout: Vec<u8>, stderr: Vec<u8>, source: WinRmError) -> WinRmError {
    if stdout.is_empty() && stderr.is_empty() {
        return source;
    }
    WinRmError::Interrupted {
        stdout,
        stderr,
        source: Box::new(source),
    }
}
