//! Tunnel client process management and cleanup
//!
//! This module provides functions to find, terminate, and cleanup
//! tunnel client processes.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::sleep;

/// Interval between liveness checks while waiting for a process to exit
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Error types for process operations
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to find process: {0}")]
    ProcessNotFound(String),

    #[error("Failed to terminate process {pid}: {reason}")]
    TerminationFailed { pid: u32, reason: String },

    #[error("Process {0} did not respond to signals")]
    UnresponsiveProcess(u32),
}

/// Check whether `pid` is a live process running `name`
///
/// Matches against the full command line rather than the kernel's command
/// name, which Linux truncates to 15 bytes. Zombie processes count as dead.
pub async fn is_process_alive(pid: u32, name: &str) -> bool {
    let output = Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "stat=", "-o", "args="])
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let line = String::from_utf8_lossy(&out.stdout);
            let line = line.trim_start();
            let (stat, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            !stat.starts_with('Z') && command_runs(args, name)
        }
        _ => false,
    }
}

/// True when the program word of `args` is `name` or a path ending in it
///
/// Only the first two words are considered, which covers `openvpn ...`,
/// `/usr/sbin/openvpn ...`, `sudo openvpn ...` and scripts run through an
/// interpreter (`/bin/sh /path/to/name ...`).
fn command_runs(args: &str, name: &str) -> bool {
    args.split_whitespace()
        .take(2)
        .any(|word| word.rsplit('/').next() == Some(name))
}

/// Extended regex equivalent of [`command_runs`] for `pgrep -f`
fn command_pattern(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    let word = format!("([^[:space:]]*/)?{}([[:space:]]|$)", escaped);
    format!("^{word}|^[^[:space:]]+[[:space:]]+{word}")
}

/// Deliver `signal` to `pid`, through `sudo kill` when the process is privileged
async fn send_signal(pid: u32, signal: Signal, elevated: bool) -> Result<(), ProcessError> {
    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or_else(|| ProcessError::TerminationFailed {
            pid,
            reason: "not a single process id".to_string(),
        })?;

    if elevated {
        let signal_name = signal.as_str().trim_start_matches("SIG");
        let status = Command::new("sudo")
            .args(["kill", "-s", signal_name, &raw.to_string()])
            .status()
            .await
            .map_err(|e| ProcessError::TerminationFailed {
                pid,
                reason: format!("Failed to run sudo kill: {}", e),
            })?;

        if !status.success() {
            return Err(ProcessError::TerminationFailed {
                pid,
                reason: format!("sudo kill -s {} exited with {}", signal_name, status),
            });
        }
        return Ok(());
    }

    kill(Pid::from_raw(raw), signal).map_err(|e| ProcessError::TerminationFailed {
        pid,
        reason: format!("Failed to send {}: {}", signal, e),
    })
}

/// Terminate a tunnel client process gracefully
///
/// Sends SIGTERM first, waits up to `timeout`, then sends SIGKILL if still alive.
pub async fn terminate_process(
    pid: u32,
    name: &str,
    timeout: Duration,
    elevated: bool,
) -> Result<(), ProcessError> {
    if !is_process_alive(pid, name).await {
        return Ok(()); // Already terminated
    }

    tracing::debug!(pid, "Sending SIGTERM");
    send_signal(pid, Signal::SIGTERM, elevated).await?;

    let attempts = (timeout.as_millis() / POLL_INTERVAL.as_millis()).max(1);
    for _ in 0..attempts {
        sleep(POLL_INTERVAL).await;
        if !is_process_alive(pid, name).await {
            return Ok(());
        }
    }

    tracing::warn!(pid, "Graceful shutdown timed out, sending SIGKILL");
    send_signal(pid, Signal::SIGKILL, elevated).await?;

    // Wait briefly for SIGKILL to take effect
    sleep(POLL_INTERVAL * 2).await;

    if is_process_alive(pid, name).await {
        Err(ProcessError::UnresponsiveProcess(pid))
    } else {
        Ok(())
    }
}

/// Find running processes whose command line runs `name`
pub async fn find_processes(name: &str) -> Result<Vec<u32>, ProcessError> {
    let output = Command::new("pgrep")
        .args(["-f", &command_pattern(name)])
        .output()
        .await
        .map_err(|e| ProcessError::ProcessNotFound(format!("pgrep failed: {}", e)))?;

    if !output.status.success() {
        // No processes found
        return Ok(vec![]);
    }

    let own_pid = std::process::id();
    let pids = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| *pid != own_pid)
        .collect();

    Ok(pids)
}

/// Find and terminate all processes named `name`
///
/// Returns the pids that were terminated. Failures on individual processes
/// are logged and skipped.
pub async fn cleanup_all_processes(
    name: &str,
    timeout: Duration,
    elevated: bool,
) -> Result<Vec<u32>, ProcessError> {
    let mut terminated_pids = vec![];

    for pid in find_processes(name).await? {
        match terminate_process(pid, name, timeout, elevated).await {
            Ok(()) => terminated_pids.push(pid),
            Err(e) => tracing::warn!(pid, error = %e, "Failed to terminate {} process", name),
        }
    }

    Ok(terminated_pids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_is_process_alive_with_nonexistent_pid() {
        // PID 99999999 should not exist
        assert!(!is_process_alive(99999999, "openvpn").await);
    }

    #[tokio::test]
    async fn test_is_process_alive_with_pid_1() {
        // PID 1 (init/systemd) always exists but is not openvpn
        assert!(!is_process_alive(1, "openvpn").await);
    }

    #[tokio::test]
    async fn test_terminate_nonexistent_process() {
        let result = terminate_process(99999999, "openvpn", Duration::from_secs(1), false).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_terminate_running_process() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("Failed to spawn mock process");
        let pid = child.id();

        assert!(is_process_alive(pid, "sleep").await);

        terminate_process(pid, "sleep", Duration::from_secs(2), false)
            .await
            .unwrap();
        assert!(!is_process_alive(pid, "sleep").await);

        let _ = child.wait();
    }

    /// Spawn a long-running shell script whose name exceeds the kernel's
    /// 15 byte command name
    #[cfg(unix)]
    fn spawn_long_named_script(dir: &std::path::Path, name: &str) -> std::process::Child {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join(name);
        std::fs::write(&script, "#!/bin/sh\nwhile true; do sleep 1; done\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::process::Command::new(&script)
            .spawn()
            .expect("Failed to spawn script")
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_process_with_long_name() {
        let dir = tempfile::tempdir().unwrap();
        let name = "openvpn-client-wrapper";
        let mut child = spawn_long_named_script(dir.path(), name);
        let pid = child.id();

        assert!(is_process_alive(pid, name).await);

        terminate_process(pid, name, Duration::from_secs(2), false)
            .await
            .unwrap();
        assert!(!is_process_alive(pid, name).await);

        let status = child.wait().unwrap();
        assert!(!status.success(), "script must have been signalled");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_find_processes_with_long_name() {
        let dir = tempfile::tempdir().unwrap();
        let name = "tunnel-discovery-wrapper";
        let mut child = spawn_long_named_script(dir.path(), name);
        let pid = child.id();

        // Give the interpreter time to exec
        sleep(Duration::from_millis(200)).await;
        let pids = find_processes(name).await.unwrap();

        let _ = child.kill();
        let _ = child.wait();
        assert!(pids.contains(&pid), "{} not in {:?}", pid, pids);
    }

    #[tokio::test]
    async fn test_send_signal_refuses_process_groups() {
        for pid in [0, u32::MAX] {
            let err = send_signal(pid, Signal::SIGTERM, false).await.unwrap_err();
            assert!(matches!(err, ProcessError::TerminationFailed { .. }));
        }
    }

    #[test]
    fn test_command_runs_matches_program_word() {
        assert!(command_runs("openvpn --config a.ovpn", "openvpn"));
        assert!(command_runs("/usr/sbin/openvpn --daemon", "openvpn"));
        assert!(command_runs("sudo /usr/sbin/openvpn --daemon", "openvpn"));
        assert!(command_runs(
            "/bin/sh /tmp/x/openvpn-client-wrapper __tunnel",
            "openvpn-client-wrapper"
        ));
        assert!(!command_runs("openvpn-client-wrapper", "openvpn"));
        assert!(!command_runs("ls -l /etc/openvpn", "openvpn"));
        assert!(!command_runs("", "openvpn"));
    }

    #[test]
    fn test_command_pattern_escapes_name() {
        let pattern = command_pattern("open.vpn");
        assert!(pattern.contains("open\\.vpn"));
        assert!(pattern.starts_with('^'));
    }

    #[tokio::test]
    async fn test_find_processes_unknown_name() {
        let pids = find_processes("no-such-tunnel-client").await.unwrap();
        assert!(pids.is_empty());
    }
}
