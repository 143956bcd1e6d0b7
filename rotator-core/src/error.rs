//! Error types for the vpn-rotator CLI tool
//!
//! This module defines all error types used throughout the application,
//! providing consistent error handling and user-friendly error messages.

use thiserror::Error;

use crate::oracle::OracleError;
use crate::tunnel::process::ProcessError;

/// Main error type for the vpn-rotator application
#[derive(Error, Debug)]
pub enum RotatorError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to tunnel credentials
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),

    /// Errors related to the tunnel client
    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    /// Errors related to public IP lookups
    #[error("IP oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Configuration file already exists: {path} (use --force to overwrite)")]
    AlreadyExists { path: String },

    #[error("No profiles configured, nothing to rotate through")]
    NoProfiles,

    #[error("Profile '{name}' has no configuration file at {path}")]
    MissingProfileConfig { name: String, path: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Credential lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{var} is not set in the environment or the env file")]
    Missing { var: String },

    #[error("Failed to read env file {path}: {message}")]
    EnvFile { path: String, message: String },
}

/// Tunnel client operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TunnelError {
    #[error("Tunnel client binary '{binary}' not found or not executable")]
    BinaryNotFound { binary: String },

    #[error("Failed to spawn tunnel client: {reason}")]
    ProcessSpawnError { reason: String },

    #[error("Tunnel client exited with {} for profile {profile}", exit_description(.code))]
    StartFailed { profile: String, code: Option<i32> },

    #[error("Failed to determine tunnel process id: {reason}")]
    PidFileError { reason: String },

    #[error("Failed to terminate tunnel process {pid}: {reason}")]
    TerminationError { pid: u32, reason: String },

    #[error("Failed to clean up tunnel processes: {reason}")]
    CleanupFailed { reason: String },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl From<ProcessError> for TunnelError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::ProcessNotFound(reason) => TunnelError::CleanupFailed { reason },
            ProcessError::TerminationFailed { pid, reason } => {
                TunnelError::TerminationError { pid, reason }
            }
            ProcessError::UnresponsiveProcess(pid) => TunnelError::TerminationError {
                pid,
                reason: "process did not respond to SIGKILL".to_string(),
            },
        }
    }
}
