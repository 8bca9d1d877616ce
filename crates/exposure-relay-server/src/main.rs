// crates/exposure-relay-server/src/main.rs
// ============================================================================
// Module: Exposure Relay CLI Entry Point
// Description: Command dispatcher for the Exposure Relay server.
// Purpose: Load configuration and run the HTTP surface.
// Dependencies: clap, exposure-relay-config, exposure-relay-server, tokio
// ============================================================================

//! ## Overview
//! The Exposure Relay binary loads a validated TOML configuration and serves
//! the publishing pipeline over HTTP. Failures are reported on stderr and
//! surface as a non-zero exit code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use exposure_relay_config::ExposureRelayConfig;
use exposure_relay_server::RelayServer;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Exposure Relay command-line interface.
#[derive(Debug, Parser)]
#[command(name = "exposure-relay", about = "Exposure publishing and retrieval server")]
struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Path to the configuration file (defaults to `exposure-relay.toml`
        /// or the `EXPOSURE_RELAY_CONFIG` environment variable).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Parses arguments and dispatches the selected subcommand.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            config,
        } => serve(config.as_deref()).await,
    }
}

/// Loads configuration and runs the server until shutdown.
async fn serve(path: Option<&Path>) -> ExitCode {
    let config = match ExposureRelayConfig::load(path) {
        Ok(config) => config,
        Err(err) => return fail(&err.to_string()),
    };
    match RelayServer::new(config).serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(&err.to_string()),
    }
}

/// Reports a fatal error on stderr and returns a failure exit code.
fn fail(message: &str) -> ExitCode {
    let _ = writeln!(std::io::stderr(), "exposure-relay: {message}");
    ExitCode::FAILURE
}
