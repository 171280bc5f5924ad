// file: src/main.rs
// version: 1.1.0
// guid: 64e4ab21-2174-4e94-a6ee-bc29c131a1ec

//! winrm-exec - Main entry point

use clap::Parser;
use winrm_exec::{
    cli::{args::Cli, commands::run_remote_command},
    error::EXIT_PROTOCOL_FAILURE,
    logging::logger,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = logger::init_logger(cli.verbose, cli.quiet) {
        eprintln!("winrm-exec: {}", err);
        std::process::exit(EXIT_PROTOCOL_FAILURE);
    }

    match run_remote_command(&cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("winrm-exec: {}", err);
            std::process::exit(EXIT_PROTOCOL_FAILURE);
        }
    }
}
