//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands.

pub mod init;
pub mod ip;
pub mod profiles;
pub mod run;
pub mod stop;

use rotator_core::config::{toml_config, RotatorConfig};
use rotator_core::error::RotatorError;
use std::path::Path;

/// Load the configuration from an explicit path, or the default location
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn load_config(config_path: Option<&Path>) -> Result<RotatorConfig, RotatorError> {
    match config_path {
        Some(path) => toml_config::load_config_from_path(path),
        None => toml_config::load_config(),
    }
}

/// Local wall-clock timestamp for operator-facing output
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
