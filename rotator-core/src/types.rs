//! Type definitions for profiles and credentials
//!
//! Credentials use the secrecy crate so the tunnel password is never
//! exposed in logs or debug output.

use secrecy::{ExposeSecret, Secret};
use std::fmt;
use std::path::{Path, PathBuf};

/// File extension of OpenVPN profile configuration files
pub const PROFILE_EXTENSION: &str = "ovpn";

/// A named VPN server configuration the rotation cycles through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Profile {
    name: String,
    config_path: PathBuf,
}

impl Profile {
    /// Create a profile with an explicit configuration path
    pub fn new(name: impl Into<String>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            config_path: config_path.into(),
        }
    }

    /// Create a profile whose configuration lives at `<dir>/<name>.ovpn`
    pub fn in_dir(dir: &Path, name: &str) -> Self {
        let file_name = format!("{}.{}", name, PROFILE_EXTENSION);
        Self::new(name, dir.join(file_name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Username/password pair handed to the tunnel client
///
/// Loaded once at startup and immutable for the process lifetime.
#[derive(Clone, Debug)]
pub struct Credentials {
    username: String,
    password: Secret<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Expose the password (use with caution!)
    ///
    /// Only the tunnel client's credentials file should ever see this value.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}
