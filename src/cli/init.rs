//! Init command
//!
//! Writes a default configuration file to get started with.

use rotator_core::config::{toml_config, RotatorConfig};
use rotator_core::error::RotatorError;
use std::path::Path;

/// Write the default configuration file
pub fn run_init(config_path: Option<&Path>, force: bool) -> Result<(), RotatorError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => toml_config::get_config_path()?,
    };

    let config = RotatorConfig::default();
    toml_config::save_config_to_path(&config, &path, force)?;

    println!("💾 Wrote default configuration to {}", path.display());
    println!(
        "   Place your <profile>.ovpn files in {} and set USERNAME/PASSWORD in .env",
        config.rotation.profile_dir.display()
    );
    Ok(())
}
