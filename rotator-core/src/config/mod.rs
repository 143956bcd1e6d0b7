//! Configuration module
//!
//! Handles loading and saving rotation configuration from TOML files and
//! resolving tunnel credentials from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::Profile;

pub mod credentials;
pub mod toml_config;

/// Default public IP echo endpoint
pub const DEFAULT_ORACLE_ENDPOINT: &str = "https://ifconfig.co/ip";

/// Complete configuration file structure
///
/// Every section is optional; missing sections fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RotatorConfig {
    /// Profile list and rotation timing
    #[serde(default)]
    pub rotation: RotationConfig,

    /// Tunnel client invocation settings
    #[serde(default)]
    pub tunnel: TunnelSettings,

    /// Public IP lookup settings
    #[serde(default)]
    pub oracle: OracleSettings,
}

impl RotatorConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rotation.validate()?;
        self.tunnel.validate()?;
        self.oracle.validate()?;
        Ok(())
    }
}

/// Profile list and rotation timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Profile names, rotated in order
    #[serde(default = "default_profiles")]
    pub profiles: Vec<String>,

    /// Directory holding `<name>.ovpn` files
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,

    /// Seconds each tunnel is held open
    #[serde(default = "default_dwell_secs")]
    pub dwell_secs: u64,

    /// Seconds to wait for routes to converge around connect/disconnect
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

fn default_profiles() -> Vec<String> {
    vec![
        "node-dk-03.protonvpn.net.tcp".to_string(),
        "node-fr-14.protonvpn.net.tcp".to_string(),
        "node-fr-15.protonvpn.net.tcp".to_string(),
    ]
}
fn default_profile_dir() -> PathBuf {
    PathBuf::from("./ovpn")
}
fn default_dwell_secs() -> u64 {
    60
}
fn default_settle_secs() -> u64 {
    2
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            profile_dir: default_profile_dir(),
            dwell_secs: default_dwell_secs(),
            settle_secs: default_settle_secs(),
        }
    }
}

impl RotationConfig {
    /// Validate timing and profile names
    ///
    /// An empty profile list is reported by [`RotationConfig::resolve_profiles`]
    /// so that `init` and `profiles` can still operate on such a file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dwell_secs == 0 {
            return Err(validation("dwell_secs must be at least 1"));
        }

        if self.settle_secs > 300 {
            return Err(validation(format!(
                "settle_secs must be at most 300, got: {}",
                self.settle_secs
            )));
        }

        for name in &self.profiles {
            if name.trim().is_empty() {
                return Err(validation("profile names cannot be empty"));
            }
            if name.contains('/') || name.contains('\\') {
                return Err(validation(format!(
                    "profile name '{}' must not contain path separators",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.dwell_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// Build the profile sequence without touching the filesystem
    pub fn profile_list(&self) -> Vec<Profile> {
        self.profiles
            .iter()
            .map(|name| Profile::in_dir(&self.profile_dir, name))
            .collect()
    }

    /// Build the profile sequence and require every configuration file to exist
    pub fn resolve_profiles(&self) -> Result<Vec<Profile>, ConfigError> {
        if self.profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }

        let profiles = self.profile_list();
        if let Some(missing) = profiles.iter().find(|p| !p.config_path().is_file()) {
            return Err(ConfigError::MissingProfileConfig {
                name: missing.name().to_string(),
                path: missing.config_path().display().to_string(),
            });
        }

        Ok(profiles)
    }
}

/// Tunnel client invocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSettings {
    /// Tunnel client executable (name on PATH or absolute path)
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Run the tunnel client through sudo
    #[serde(default)]
    pub use_sudo: bool,

    /// Seconds to wait after SIGTERM before sending SIGKILL
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

fn default_binary() -> String {
    "openvpn".to_string()
}
fn default_stop_timeout_secs() -> u64 {
    5
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            use_sudo: false,
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

impl TunnelSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary.trim().is_empty() {
            return Err(validation("tunnel binary cannot be empty"));
        }

        if !(1..=60).contains(&self.stop_timeout_secs) {
            return Err(validation(format!(
                "stop_timeout_secs must be between 1 and 60, got: {}",
                self.stop_timeout_secs
            )));
        }

        Ok(())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Process name used to find running tunnel clients
    pub fn process_name(&self) -> String {
        Path::new(&self.binary)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.binary.clone())
    }
}

/// Public IP lookup settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleSettings {
    /// HTTP/HTTPS endpoint that answers with the caller's IP as plain text
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ORACLE_ENDPOINT.to_string()
}
fn default_oracle_timeout_secs() -> u64 {
    10
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

impl OracleSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=120).contains(&self.timeout_secs) {
            return Err(validation(format!(
                "oracle timeout_secs must be between 1 and 120, got: {}",
                self.timeout_secs
            )));
        }

        match url::Url::parse(&self.endpoint) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(()),
                scheme => Err(validation(format!(
                    "oracle endpoint scheme must be http or https, got: {}",
                    scheme
                ))),
            },
            Err(e) => Err(validation(format!(
                "oracle endpoint is not a valid URL: {}",
                e
            ))),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}
