//! TOML configuration file I/O
//!
//! Handles loading and saving rotation configuration to/from TOML files
//! in the user's configuration directory.

use crate::config::RotatorConfig;
use crate::error::{ConfigError, RotatorError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default configuration directory
///
/// Returns ~/.config/vpn-rotator on Linux, or VPN_ROTATOR_CONFIG_DIR if set.
/// When running under sudo, the invoking user's home is used.
pub fn get_config_dir() -> Result<PathBuf, RotatorError> {
    // Allow tests to override config directory via environment variable
    if let Ok(config_dir) = std::env::var("VPN_ROTATOR_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = if let Ok(sudo_user) = std::env::var("SUDO_USER") {
        std::env::var("SUDO_HOME").unwrap_or_else(|_| format!("/home/{}", sudo_user))
    } else {
        std::env::var("HOME").map_err(|_| {
            RotatorError::Config(ConfigError::IoError {
                message: "HOME environment variable not set".to_string(),
            })
        })?
    };

    Ok(PathBuf::from(home).join(".config").join("vpn-rotator"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, RotatorError> {
    let config_dir = get_config_dir()?;
    Ok(config_dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from the default location
///
/// A missing default file is not an error: built-in defaults are used.
pub fn load_config() -> Result<RotatorConfig, RotatorError> {
    let config_path = get_config_path()?;
    if !config_path.exists() {
        info!(
            "No configuration file at {}, using defaults",
            config_path.display()
        );
        return Ok(RotatorConfig::default());
    }
    load_config_from_path(&config_path)
}

/// Load configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<RotatorConfig, RotatorError> {
    let contents = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RotatorError::Config(ConfigError::LoadFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        }),
        _ => RotatorError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        }),
    })?;

    let config: RotatorConfig = toml::from_str(&contents)?;

    config.validate()?;

    debug!(
        "Loaded configuration from {}: {} profiles, dwell={}s, settle={}s, binary={}",
        path.as_ref().display(),
        config.rotation.profiles.len(),
        config.rotation.dwell_secs,
        config.rotation.settle_secs,
        config.tunnel.binary
    );

    Ok(config)
}

/// Save configuration to a specific TOML file
///
/// Refuses to replace an existing file unless `overwrite` is set.
pub fn save_config_to_path<P: AsRef<Path>>(
    config: &RotatorConfig,
    path: P,
    overwrite: bool,
) -> Result<(), RotatorError> {
    let path = path.as_ref();

    config.validate()?;

    if path.exists() && !overwrite {
        return Err(RotatorError::Config(ConfigError::AlreadyExists {
            path: path.to_string_lossy().to_string(),
        }));
    }

    // Ensure config directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            RotatorError::Config(ConfigError::IoError {
                message: format!("Failed to create config directory: {}", e),
            })
        })?;
    }

    let toml_string = toml::to_string_pretty(config)?;

    std::fs::write(path, toml_string).map_err(|_e| {
        RotatorError::Config(ConfigError::SaveFailed {
            path: path.to_string_lossy().to_string(),
        })
    })?;

    info!("Saved configuration to {}", path.display());
    Ok(())
}
