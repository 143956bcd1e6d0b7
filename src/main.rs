//! vpn-rotator - public IP rotation over OpenVPN
//!
//! Cycles through a list of OpenVPN profiles, holding each tunnel open for a
//! fixed dwell time and reporting the public IP seen through it.

use clap::{Parser, Subcommand};
use rotator_core::error::{RotatorError, TunnelError};
use rotator_core::init_logging;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "vpn-rotator")]
#[command(about = "Rotate your public IP by cycling through OpenVPN profiles")]
struct Cli {
    /// Configuration file (default: ~/.config/vpn-rotator/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotate through the configured profiles until interrupted
    Run(cli::run::RunArgs),
    /// Show the current public IP address
    Ip {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the configured profiles in rotation order
    Profiles,
    /// Stop all running tunnel client processes
    Stop,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run(args) => cli::run::run_rotation(config_path, args).await,
        Commands::Ip { json } => cli::ip::run_ip(config_path, json).await,
        Commands::Profiles => cli::profiles::run_profiles(config_path),
        Commands::Stop => cli::stop::run_stop(config_path).await,
        Commands::Init { force } => cli::init::run_init(config_path, force),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

/// Map an error to the process exit code
///
/// 2 for configuration/setup problems detected at startup, 1 for runtime failures.
fn exit_code(error: &RotatorError) -> i32 {
    match error {
        // Configuration errors (exit code 2)
        RotatorError::Config(_) | RotatorError::Toml(_) | RotatorError::TomlSerialize(_) => 2,
        // Missing credentials cannot be recovered from at runtime
        RotatorError::Credentials(_) => 2,
        // A missing tunnel client is a setup issue; other tunnel errors are runtime
        RotatorError::Tunnel(TunnelError::BinaryNotFound { .. }) => 2,
        RotatorError::Tunnel(_) => 1,
        // Oracle and IO errors (exit code 1 - runtime)
        RotatorError::Oracle(_) => 1,
        RotatorError::Io(_) => 1,
    }
}
