//! Public IP command
//!
//! Asks the configured IP oracle once and prints the answer.

use rotator_core::error::RotatorError;
use rotator_core::oracle::{HttpIpOracle, IpOracle};
use serde::Serialize;
use std::net::IpAddr;
use std::path::Path;

use super::{load_config, timestamp};

/// Machine-readable output of `vpn-rotator ip --json`
#[derive(Debug, Serialize)]
struct IpReport<'a> {
    ip: IpAddr,
    endpoint: &'a str,
}

/// Run the ip command
pub async fn run_ip(config_path: Option<&Path>, json: bool) -> Result<(), RotatorError> {
    let config = load_config(config_path)?;
    let oracle = HttpIpOracle::from_settings(&config.oracle)?;

    let ip = oracle.public_ip().await?;

    if json {
        let report = IpReport {
            ip,
            endpoint: oracle.endpoint(),
        };
        let rendered = serde_json::to_string(&report)
            .map_err(|e| RotatorError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        println!("{}", rendered);
    } else {
        println!("[{}] Your public IP address is: {}", timestamp(), ip);
    }

    Ok(())
}
