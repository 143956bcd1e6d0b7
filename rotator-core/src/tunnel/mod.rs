//! Tunnel client module
//!
//! Defines the tunnel client abstraction used by the rotation loop and the
//! OpenVPN binding that implements it.

pub mod openvpn;
pub mod process;

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[cfg(test)]
use mockall::automock;

use crate::error::TunnelError;
use crate::types::{Credentials, Profile};

// Public re-exports
pub use openvpn::OpenVpnClient;

/// Runtime handle of one active tunnel
///
/// Owns the tunnel's private runtime directory (credentials file, pid file),
/// which is removed when the session is dropped.
#[derive(Debug)]
pub struct Session {
    profile: Profile,
    pid: u32,
    started_at: Instant,
    workdir: Option<TempDir>,
}

impl Session {
    pub fn new(profile: Profile, pid: u32) -> Self {
        Self {
            profile,
            pid,
            started_at: Instant::now(),
            workdir: None,
        }
    }

    pub(crate) fn with_workdir(mut self, workdir: TempDir) -> Self {
        self.workdir = Some(workdir);
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Process id of the tunnel client daemon
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Black-box program that establishes and tears down tunnels
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TunnelClient: Send + Sync {
    /// Bring up a tunnel for `profile`
    ///
    /// A non-zero exit of the client is reported as [`TunnelError::StartFailed`].
    async fn start(
        &self,
        profile: &Profile,
        credentials: &Credentials,
    ) -> Result<Session, TunnelError>;

    /// Tear down a single session
    async fn stop(&self, session: Session) -> Result<(), TunnelError>;

    /// Forcibly stop every running tunnel process, returning the pids stopped
    async fn stop_all(&self) -> Result<Vec<u32>, TunnelError>;
}
