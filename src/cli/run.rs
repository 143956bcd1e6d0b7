//! Rotation command
//!
//! Validates everything the loop needs up front, then rotates until the
//! operator interrupts.

use clap::Args;
use colored::Colorize;
use rotator_core::config::credentials::load_credentials;
use rotator_core::config::RotationConfig;
use rotator_core::error::RotatorError;
use rotator_core::oracle::HttpIpOracle;
use rotator_core::rotation::{RotationLoop, RotationSchedule};
use rotator_core::tunnel::OpenVpnClient;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{load_config, timestamp};

/// Options for `vpn-rotator run`
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Env file with USERNAME and PASSWORD (default: ./.env when present)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Profile to rotate through; repeat to build the list (overrides config)
    #[arg(short, long = "profile", value_name = "NAME")]
    pub profiles: Vec<String>,

    /// Directory containing <profile>.ovpn files
    #[arg(long)]
    pub profile_dir: Option<PathBuf>,

    /// Seconds to hold each tunnel open
    #[arg(long, value_name = "SECS")]
    pub dwell: Option<u64>,

    /// Seconds to wait for routes to settle around connect/disconnect
    #[arg(long, value_name = "SECS")]
    pub settle: Option<u64>,

    /// Stop after this many full passes over the profile list
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub cycles: Option<u32>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the configuration file
    fn apply(&self, rotation: &mut RotationConfig) {
        if !self.profiles.is_empty() {
            rotation.profiles = self.profiles.clone();
        }
        if let Some(dir) = &self.profile_dir {
            rotation.profile_dir = dir.clone();
        }
        if let Some(dwell) = self.dwell {
            rotation.dwell_secs = dwell;
        }
        if let Some(settle) = self.settle {
            rotation.settle_secs = settle;
        }
    }
}

/// Run the rotation loop until interrupted
pub async fn run_rotation(config_path: Option<&Path>, args: RunArgs) -> Result<(), RotatorError> {
    let mut config = load_config(config_path)?;
    args.apply(&mut config.rotation);
    config.validate()?;

    // Startup validation, fatal on failure: profiles, credentials, client binary
    let profiles = config.rotation.resolve_profiles()?;
    let credentials = load_credentials(args.env_file.as_deref())?;
    let client = OpenVpnClient::new(&config.tunnel)?;
    let oracle = HttpIpOracle::from_settings(&config.oracle)?;

    let schedule = RotationSchedule::new(config.rotation.dwell(), config.rotation.settle())
        .with_max_cycles(args.cycles);
    let rotation = RotationLoop::new(client, oracle, profiles, credentials, schedule)?;

    println!(
        "[{}] {} Rotating through {} profile(s) every {}s (Ctrl+C to stop)",
        timestamp(),
        "▶".green(),
        rotation.profiles().len(),
        config.rotation.dwell_secs
    );
    info!(
        binary = %config.tunnel.binary,
        use_sudo = config.tunnel.use_sudo,
        oracle = %config.oracle.endpoint,
        "Rotation configured"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(listen_for_signals(shutdown_tx));

    let summary = rotation.run(shutdown_rx).await;

    println!(
        "[{}] {} Rotation stopped: {} tunnel(s) started, {} failed, {} full cycle(s)",
        timestamp(),
        "■".yellow(),
        summary.started,
        summary.failed,
        summary.cycles
    );
    Ok(())
}

/// Publish a shutdown request on the first interrupt
///
/// A second interrupt exits immediately without waiting for cleanup.
async fn listen_for_signals(shutdown_tx: watch::Sender<bool>) {
    wait_for_signal().await;
    println!("\nReceived interrupt. Disconnecting from all VPN connections...");
    let _ = shutdown_tx.send(true);

    wait_for_signal().await;
    eprintln!("Received second interrupt, exiting without waiting for cleanup");
    std::process::exit(0);
}

/// Wait for Ctrl+C, or SIGTERM on unix
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
