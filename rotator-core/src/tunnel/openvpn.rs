//! OpenVPN tunnel client
//!
//! Runs the `openvpn` executable in daemon mode for each profile, and
//! terminates it by pid when the session is torn down.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::TunnelSettings;
use crate::error::TunnelError;
use crate::tunnel::process::{cleanup_all_processes, terminate_process};
use crate::tunnel::{Session, TunnelClient};
use crate::types::{Credentials, Profile};

const AUTH_FILE_NAME: &str = "auth.txt";
const PID_FILE_NAME: &str = "openvpn.pid";

/// How long to wait for the daemon to write its pid file
const PID_WAIT: Duration = Duration::from_secs(3);
const PID_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tunnel client backed by the OpenVPN command-line binary
#[derive(Debug, Clone)]
pub struct OpenVpnClient {
    /// Resolved path of the openvpn executable
    binary: PathBuf,

    /// Process name used for liveness checks and `stop_all`
    process_name: String,

    /// Run openvpn (and signal it) through sudo
    use_sudo: bool,

    /// Grace period between SIGTERM and SIGKILL
    stop_timeout: Duration,
}

impl OpenVpnClient {
    /// Create a client, resolving the binary on PATH
    ///
    /// A missing binary is a fatal configuration problem, so it is reported
    /// here rather than on the first start.
    pub fn new(settings: &TunnelSettings) -> Result<Self, TunnelError> {
        let binary = which::which(&settings.binary).map_err(|e| {
            tracing::debug!("Failed to resolve {}: {}", settings.binary, e);
            TunnelError::BinaryNotFound {
                binary: settings.binary.clone(),
            }
        })?;

        if settings.use_sudo && which::which("sudo").is_err() {
            return Err(TunnelError::BinaryNotFound {
                binary: "sudo".to_string(),
            });
        }

        tracing::debug!("Using tunnel client at {}", binary.display());

        Ok(Self {
            binary,
            process_name: settings.process_name(),
            use_sudo: settings.use_sudo,
            stop_timeout: settings.stop_timeout(),
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments passed to openvpn for one profile
    fn command_args(profile: &Profile, auth_file: &Path, pid_file: &Path) -> Vec<OsString> {
        vec![
            "--config".into(),
            profile.config_path().into(),
            "--auth-user-pass".into(),
            auth_file.into(),
            "--daemon".into(),
            "--writepid".into(),
            pid_file.into(),
        ]
    }

    fn build_command(&self, profile: &Profile, auth_file: &Path, pid_file: &Path) -> Command {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(&self.binary);
            cmd
        } else {
            Command::new(&self.binary)
        };

        cmd.args(Self::command_args(profile, auth_file, pid_file))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Write the credentials file read by `--auth-user-pass`
    fn write_auth_file(dir: &Path, credentials: &Credentials) -> Result<PathBuf, TunnelError> {
        let path = dir.join(AUTH_FILE_NAME);

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&path).map_err(|e| TunnelError::ProcessSpawnError {
            reason: format!("Failed to create credentials file: {}", e),
        })?;

        writeln!(file, "{}", credentials.username())
            .and_then(|_| writeln!(file, "{}", credentials.expose_password()))
            .map_err(|e| TunnelError::ProcessSpawnError {
                reason: format!("Failed to write credentials file: {}", e),
            })?;

        Ok(path)
    }

    /// Parse a pid file, rejecting values that `kill` would treat as a
    /// process group
    fn parse_pid(contents: &str) -> Option<u32> {
        match contents.trim().parse::<u32>() {
            Ok(pid) if pid != 0 && pid <= i32::MAX as u32 => Some(pid),
            Ok(pid) => {
                tracing::warn!(pid, "Ignoring invalid pid in pid file");
                None
            }
            Err(_) => None,
        }
    }

    /// Poll the pid file until the daemon has written it
    async fn wait_for_pid(pid_file: &Path, wait: Duration) -> Option<u32> {
        let attempts = (wait.as_millis() / PID_POLL_INTERVAL.as_millis()).max(1);

        for _ in 0..attempts {
            if let Ok(contents) = tokio::fs::read_to_string(pid_file).await {
                if let Some(pid) = Self::parse_pid(&contents) {
                    return Some(pid);
                }
            }
            tokio::time::sleep(PID_POLL_INTERVAL).await;
        }

        None
    }
}

#[async_trait]
impl TunnelClient for OpenVpnClient {
    async fn start(
        &self,
        profile: &Profile,
        credentials: &Credentials,
    ) -> Result<Session, TunnelError> {
        let workdir = tempfile::Builder::new()
            .prefix("vpn-rotator-")
            .tempdir()
            .map_err(|e| TunnelError::ProcessSpawnError {
                reason: format!("Failed to create runtime directory: {}", e),
            })?;

        let auth_file = Self::write_auth_file(workdir.path(), credentials)?;
        let pid_file = workdir.path().join(PID_FILE_NAME);

        tracing::info!(
            profile = %profile,
            config = %profile.config_path().display(),
            "Starting tunnel client"
        );

        let output = self
            .build_command(profile, &auth_file, &pid_file)
            .output()
            .await
            .map_err(|e| TunnelError::ProcessSpawnError {
                reason: format!("Failed to spawn {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(profile = %profile, "Tunnel client stderr: {}", stderr.trim());
            return Err(TunnelError::StartFailed {
                profile: profile.name().to_string(),
                code: output.status.code(),
            });
        }

        let Some(pid) = Self::wait_for_pid(&pid_file, PID_WAIT).await else {
            // The daemon may be running without a pid we can track
            if let Err(e) =
                cleanup_all_processes(&self.process_name, self.stop_timeout, self.use_sudo).await
            {
                tracing::warn!("Cleanup after missing pid file failed: {}", e);
            }
            return Err(TunnelError::PidFileError {
                reason: format!("{} was not written", pid_file.display()),
            });
        };

        tracing::info!(profile = %profile, pid, "Tunnel client daemonized");
        Ok(Session::new(profile.clone(), pid).with_workdir(workdir))
    }

    async fn stop(&self, session: Session) -> Result<(), TunnelError> {
        tracing::info!(
            profile = %session.profile(),
            pid = session.pid(),
            "Stopping tunnel client"
        );

        terminate_process(
            session.pid(),
            &self.process_name,
            self.stop_timeout,
            self.use_sudo,
        )
        .await?;

        Ok(())
    }

    async fn stop_all(&self) -> Result<Vec<u32>, TunnelError> {
        let pids =
            cleanup_all_processes(&self.process_name, self.stop_timeout, self.use_sudo).await?;
        if !pids.is_empty() {
            tracing::info!(?pids, "Stopped {} process(es)", self.process_name);
        }
        Ok(pids)
    }
}
