// file: src/cli/commands.rs
// version: 1.1.0
// guid: 925ca9db-bd09-4858-8634-c913341b8f35

//! Command implementations for the CLI

use crate::{
    auth::Credentials,
    cli::Cli,
    error::WinRmError,
    network::{WinRmConfig, WinRmSession},
    Result,
};
use std::io::Write;
use std::time::Duration;
use tracing::debug;

/// Run the PowerShell command on the target and relay its output
///
/// Returns the remote exit code. Output captured before a transport
/// failure is still relayed before the error propagates.
pub async fn run_remote_command(cli: &Cli) -> Result<i32> {
    let mut config = WinRmConfig::for_host(&cli.host)?;
    config.connect_timeout = Duration::from_secs(cli.connect_timeout);
    config.read_timeout = Duration::from_secs(cli.read_timeout);

    let credentials = Credentials::new(&cli.user, &cli.password);
    let session = WinRmSession::connect(config, credentials)?;

    match session.run_powershell(&cli.command).await {
        Ok(result) => {
            debug!(exit_code = result.exit_code, "relaying remote result");
            relay_output(&result.stdout, &result.stderr)?;
            Ok(result.exit_code)
        }
        Err(WinRmError::Interrupted {
            stdout,
            stderr,
            source,
        }) => {
            relay_output(&stdout, &stderr)?;
            Err(*source)
        }
        Err(err) => Err(err),
    }
}

/// Write the captured streams through byte for byte.
fn relay_output(stdout: &[u8], stderr: &[u8]) -> Result<()> {
    if !stdout.is_empty() {
        let mut out = std::io::stdout().lock();
        out.write_all(stdout)?;
        out.flush()?;
    }
    if !stderr.is_empty() {
        let mut err = std::io::stderr().lock();
        err.write_all(stderr)?;
        err.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn test_bad_port_fails_before_any_network_use() {
        // Arrange
        let cli =
            Cli::try_parse_from(["winrm-exec", "srv01:99999", "admin", "pw", "hostname"]).unwrap();

        // Act
        let result = run_remote_command(&cli).await;

        // Assert
        assert!(matches!(result, Err(WinRmError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_host_fails_before_any_network_use() {
        // Arrange
        let cli = Cli::try_parse_from(["winrm-exec", "", "admin", "pw", "hostname"]).unwrap();

        // Act
        let result = run_remote_command(&cli).await;

        // Assert
        assert!(matches!(result, Err(WinRmError::Config(_))));
    }

    #[test]
    fn test_relay_with_empty_streams_is_a_no_op() {
        // Act & Assert
        assert!(relay_output(&[], &[]).is_ok());
    }
}
