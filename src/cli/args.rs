// file: src/cli/args.rs
// version: 1.1.0
// guid: 199feccb-8b57-4411-969f-d3091ce76149

//! Command line argument definitions

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "winrm-exec")]
#[command(about = "Run a PowerShell command on a remote Windows host over WinRM")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Target host, optionally with a port (default 5985)
    pub host: String,

    /// Account name; DOMAIN\user and user@domain forms are accepted
    pub user: String,

    /// Account password
    pub password: String,

    /// PowerShell command to run on the target
    #[arg(allow_hyphen_values = true)]
    pub command: String,

    /// TCP connect timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub connect_timeout: u64,

    /// Per-request read timeout in seconds; keep it above the 20 second
    /// output poll window
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub read_timeout: u64,

    /// Enable verbose protocol logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_the_four_positionals() {
        // Act
        let cli = Cli::try_parse_from(["winrm-exec", "srv01", "admin", "pw", "Get-Date"]).unwrap();

        // Assert
        assert_eq!(cli.host, "srv01");
        assert_eq!(cli.user, "admin");
        assert_eq!(cli.password, "pw");
        assert_eq!(cli.command, "Get-Date");
        assert_eq!(cli.connect_timeout, 30);
        assert_eq!(cli.read_timeout, 60);
        assert!(!cli.verbose);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_missing_arguments_are_rejected() {
        // Act & Assert
        assert!(Cli::try_parse_from(["winrm-exec"]).is_err());
        assert!(Cli::try_parse_from(["winrm-exec", "srv01", "admin", "pw"]).is_err());
    }

    #[test]
    fn test_extra_arguments_are_rejected() {
        // Act
        let result = Cli::try_parse_from(["winrm-exec", "srv01", "admin", "pw", "ipconfig", "x"]);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_timeout_flags_override_defaults() {
        // Act
        let cli = Cli::try_parse_from([
            "winrm-exec",
            "--connect-timeout",
            "5",
            "--read-timeout",
            "90",
            "srv01",
            "admin",
            "pw",
            "hostname",
        ])
        .unwrap();

        // Assert
        assert_eq!(cli.connect_timeout, 5);
        assert_eq!(cli.read_timeout, 90);
    }

    #[test]
    fn test_command_may_start_with_a_hyphen_after_separator() {
        // Act
        let cli =
            Cli::try_parse_from(["winrm-exec", "srv01", "admin", "pw", "--", "-join('a','b')"])
                .unwrap();

        // Assert
        assert_eq!(cli.command, "-join('a','b')");
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        // Act
        let result =
            Cli::try_parse_from(["winrm-exec", "-v", "-q", "srv01", "admin", "pw", "hostname"]);

        // Assert
        assert!(result.is_err());
    }
}
