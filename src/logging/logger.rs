// file: src/logging/logger.rs
// version: 1.1.0
// guid: 2d98d536-aa37-48fa-9a13-78a0e1bdca16

//! Logger initialization and configuration

use crate::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system
///
/// Log lines go to stderr so stdout stays reserved for relayed remote
/// output. The default level is `warn`; a clean run prints nothing of
/// its own.
pub fn init_logger(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| {
            crate::WinRmError::Config(format!("Failed to initialize logger: {}", e))
        })?;

    Ok(())
}
