//! Stop command
//!
//! Terminates every running tunnel client process, like `pkill openvpn`.

use rotator_core::error::RotatorError;
use rotator_core::tunnel::{OpenVpnClient, TunnelClient};
use std::path::Path;

use super::load_config;

/// Stop all tunnel client processes
pub async fn run_stop(config_path: Option<&Path>) -> Result<(), RotatorError> {
    let config = load_config(config_path)?;
    let client = OpenVpnClient::new(&config.tunnel)?;

    let pids = client.stop_all().await?;

    if pids.is_empty() {
        println!("No {} processes running", config.tunnel.process_name());
    } else {
        let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
        println!("✓ Stopped {} (pid {})", client.binary().display(), pids.join(", "));
    }

    Ok(())
}
