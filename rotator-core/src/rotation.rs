//! Rotation loop
//!
//! Cycles through the profile list forever: connect, let routes settle,
//! report the public IP, hold the tunnel for the dwell time, disconnect.
//! Strictly sequential; at most one session is alive at any instant.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::oracle::IpOracle;
use crate::tunnel::{Session, TunnelClient};
use crate::types::{Credentials, Profile};

/// Minimum wait after a failed start, even with a zero settle time
const FAILED_START_BACKOFF: Duration = Duration::from_secs(1);

/// Fixed timing of the rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationSchedule {
    /// How long each tunnel is held open
    pub dwell: Duration,

    /// Pause around connect and disconnect for routes to converge
    pub settle: Duration,

    /// Stop after this many full passes over the profile list
    pub max_cycles: Option<u32>,
}

impl RotationSchedule {
    pub fn new(dwell: Duration, settle: Duration) -> Self {
        Self {
            dwell,
            settle,
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u32>) -> Self {
        self.max_cycles = max_cycles;
        self
    }
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationSummary {
    /// Tunnels successfully started
    pub started: u32,

    /// Tunnel starts that failed
    pub failed: u32,

    /// Completed passes over the profile list
    pub cycles: u32,
}

/// Mutable state threaded through each iteration
#[derive(Debug, Default)]
struct LoopState {
    /// Index of the profile being rotated to
    cursor: usize,

    /// The single live tunnel, if any
    session: Option<Session>,

    summary: RotationSummary,
}

impl LoopState {
    /// Move to the next profile, returning true when a full cycle completed
    fn advance(&mut self, profile_count: usize) -> bool {
        self.cursor = (self.cursor + 1) % profile_count;
        if self.cursor == 0 {
            self.summary.cycles += 1;
            true
        } else {
            false
        }
    }
}

/// Round-robin rotation over a fixed profile list
pub struct RotationLoop<C, O> {
    client: C,
    oracle: O,
    profiles: Vec<Profile>,
    credentials: Credentials,
    schedule: RotationSchedule,
    shut_down: AtomicBool,
}

impl<C, O> RotationLoop<C, O>
where
    C: TunnelClient,
    O: IpOracle,
{
    /// Create a rotation loop
    ///
    /// Fails with [`ConfigError::NoProfiles`] when there is nothing to rotate.
    pub fn new(
        client: C,
        oracle: O,
        profiles: Vec<Profile>,
        credentials: Credentials,
        schedule: RotationSchedule,
    ) -> Result<Self, ConfigError> {
        if profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }

        Ok(Self {
            client,
            oracle,
            profiles,
            credentials,
            schedule,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Rotate until shutdown is requested (or the cycle limit is reached)
    ///
    /// Per-profile failures never end the loop. On exit, the live session
    /// and every other tunnel process are stopped. A loop that has already
    /// shut down does not start again.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> RotationSummary {
        let mut state = LoopState::default();

        if self.shut_down.load(Ordering::SeqCst) {
            warn!("Rotation loop already shut down, not restarting");
            return state.summary;
        }

        info!(
            profiles = self.profiles.len(),
            dwell_secs = self.schedule.dwell.as_secs(),
            settle_secs = self.schedule.settle.as_secs(),
            "Starting rotation"
        );

        if self
            .report_ip("before rotation", &mut shutdown)
            .await
            .is_continue()
        {
            while self.rotate_once(&mut state, &mut shutdown).await.is_continue() {
                let cycle_completed = state.advance(self.profiles.len());
                if cycle_completed {
                    debug!(cycles = state.summary.cycles, "Completed rotation cycle");
                    if let Some(max) = self.schedule.max_cycles {
                        if state.summary.cycles >= max {
                            info!(cycles = max, "Cycle limit reached");
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown(&mut state).await;
        state.summary
    }

    /// One step of the rotation for the profile under the cursor
    async fn rotate_once(
        &self,
        state: &mut LoopState,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ControlFlow<()> {
        let profile = &self.profiles[state.cursor];
        info!(profile = %profile, "Connecting to {}", profile.config_path().display());

        let started = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => return ControlFlow::Break(()),
            result = self.client.start(profile, &self.credentials) => result,
        };

        match started {
            Ok(session) => {
                state.summary.started += 1;
                state.session = Some(session);
            }
            Err(e) => {
                state.summary.failed += 1;
                warn!(profile = %profile, error = %e, "Failed to start tunnel, moving to next profile");
                return pause(self.schedule.settle.max(FAILED_START_BACKOFF), shutdown).await;
            }
        }

        pause(self.schedule.settle, shutdown).await?;
        self.report_ip("through tunnel", shutdown).await?;
        pause(self.schedule.dwell, shutdown).await?;

        self.teardown(state).await;
        pause(self.schedule.settle, shutdown).await
    }

    /// Log the current public IP; lookup failures are not fatal
    async fn report_ip(
        &self,
        context: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ControlFlow<()> {
        let result = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => return ControlFlow::Break(()),
            result = self.oracle.public_ip() => result,
        };

        match result {
            Ok(ip) => info!(%ip, "Public IP {}: {}", context, ip),
            Err(e) => warn!(error = %e, "Public IP lookup {} failed", context),
        }

        ControlFlow::Continue(())
    }

    /// Stop the live session, if any
    async fn teardown(&self, state: &mut LoopState) {
        let Some(session) = state.session.take() else {
            return;
        };

        let profile = session.profile().clone();
        let uptime = session.uptime();
        info!(profile = %profile, "Disconnecting from {}", profile.config_path().display());

        match self.client.stop(session).await {
            Ok(()) => debug!(profile = %profile, uptime_secs = uptime.as_secs(), "Tunnel stopped"),
            Err(e) => warn!(profile = %profile, error = %e, "Failed to stop tunnel cleanly"),
        }
    }

    /// Stop everything; runs at most once
    async fn shutdown(&self, state: &mut LoopState) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already performed");
            return;
        }

        info!("Disconnecting from all VPN connections");
        self.teardown(state).await;

        match self.client.stop_all().await {
            Ok(pids) if pids.is_empty() => debug!("No stray tunnel processes"),
            Ok(pids) => info!(?pids, "Stopped stray tunnel processes"),
            Err(e) => warn!(error = %e, "Failed to stop all tunnel processes"),
        }
    }
}

/// Resolves once shutdown has been requested
///
/// Never resolves if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Sleep for `duration` unless shutdown is requested first
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> ControlFlow<()> {
    tokio::select! {
        biased;
        _ = shutdown_requested(shutdown) => ControlFlow::Break(()),
        _ = tokio::time::sleep(duration) => ControlFlow::Continue(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TunnelError;
    use crate::oracle::OracleError;
    use crate::tunnel::MockTunnelClient;
    use async_trait::async_trait;
    use mockall::predicate::always;
    use std::net::IpAddr;
    use std::path::Path;

    struct UnreachableOracle;

    #[async_trait]
    impl IpOracle for UnreachableOracle {
        async fn public_ip(&self) -> Result<IpAddr, OracleError> {
            Err(OracleError::RequestFailed("unreachable".to_string()))
        }
    }

    fn profiles(names: &[&str]) -> Vec<Profile> {
        names
            .iter()
            .map(|name| Profile::in_dir(Path::new("/etc/ovpn"), name))
            .collect()
    }

    fn schedule() -> RotationSchedule {
        RotationSchedule::new(Duration::from_secs(60), Duration::from_secs(2))
    }

    #[test]
    fn test_new_rejects_empty_profiles() {
        let client = MockTunnelClient::new();
        let result = RotationLoop::new(
            client,
            UnreachableOracle,
            vec![],
            Credentials::new("user", "pass"),
            schedule(),
        );
        assert!(matches!(result, Err(ConfigError::NoProfiles)));
    }

    #[test]
    fn test_loop_state_advance_wraps() {
        let mut state = LoopState::default();
        assert!(!state.advance(3));
        assert!(!state.advance(3));
        assert!(state.advance(3));
        assert_eq!(state.cursor, 0);
        assert_eq!(state.summary.cycles, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_moves_on_and_oracle_failures_are_tolerated() {
        let mut client = MockTunnelClient::new();
        client
            .expect_start()
            .with(always(), always())
            .times(2)
            .returning(|profile, _| {
                if profile.name() == "a" {
                    Err(TunnelError::StartFailed {
                        profile: "a".to_string(),
                        code: Some(1),
                    })
                } else {
                    Ok(Session::new(profile.clone(), 7))
                }
            });
        client.expect_stop().times(1).returning(|_| Ok(()));
        client.expect_stop_all().times(1).returning(|| Ok(vec![]));

        let rotation = RotationLoop::new(
            client,
            UnreachableOracle,
            profiles(&["a", "b"]),
            Credentials::new("user", "pass"),
            schedule().with_max_cycles(Some(1)),
        )
        .unwrap();

        let (_tx, rx) = watch::channel(false);
        let summary = rotation.run(rx).await;

        assert_eq!(
            summary,
            RotationSummary {
                started: 1,
                failed: 1,
                cycles: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_starts_back_off_without_settle_time() {
        let mut client = MockTunnelClient::new();
        client.expect_start().times(3).returning(|profile, _| {
            Err(TunnelError::StartFailed {
                profile: profile.name().to_string(),
                code: Some(1),
            })
        });
        client.expect_stop_all().times(1).returning(|| Ok(vec![]));

        let rotation = RotationLoop::new(
            client,
            UnreachableOracle,
            profiles(&["broken"]),
            Credentials::new("user", "pass"),
            RotationSchedule::new(Duration::from_secs(60), Duration::ZERO)
                .with_max_cycles(Some(3)),
        )
        .unwrap();

        let started = tokio::time::Instant::now();
        let (_tx, rx) = watch::channel(false);
        let summary = rotation.run(rx).await;

        assert_eq!(summary.failed, 3);
        assert!(started.elapsed() >= FAILED_START_BACKOFF * 3);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_runs_once() {
        let mut client = MockTunnelClient::new();
        client
            .expect_start()
            .times(1)
            .returning(|profile, _| Ok(Session::new(profile.clone(), 7)));
        client.expect_stop().times(1).returning(|_| Ok(()));
        client.expect_stop_all().times(1).returning(|| Ok(vec![7]));

        let rotation = RotationLoop::new(
            client,
            UnreachableOracle,
            profiles(&["only"]),
            Credentials::new("user", "pass"),
            schedule().with_max_cycles(Some(1)),
        )
        .unwrap();

        let (_tx, rx) = watch::channel(false);
        let first = rotation.run(rx.clone()).await;
        assert_eq!(first.started, 1);

        let second = rotation.run(rx).await;
        assert_eq!(second, RotationSummary::default());
    }
}
