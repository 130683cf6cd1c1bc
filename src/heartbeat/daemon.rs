//! Cron-scheduled daemon that runs background cycles.
//!
//! Each tick runs one cycle with no user command. Cycles never overlap: the
//! next schedule time is computed only after the previous cycle returned.
//! A run of failed cycles makes the daemon back off before trying again.

use crate::agent::{CycleRequest, Orchestrator};
use crate::config::DaemonConfig;
use crate::types::CycleStatus;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counts consecutive failed cycles.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    consecutive: u32,
    limit: u32,
    backoff: Duration,
}

impl FailureTracker {
    pub fn new(limit: u32, backoff: Duration) -> Self {
        Self {
            consecutive: 0,
            limit: limit.max(1),
            backoff,
        }
    }

    /// Record a finished cycle; returns a pause when the failure limit is hit.
    pub fn record(&mut self, status: CycleStatus) -> Option<Duration> {
        if !status.is_failure() {
            self.consecutive = 0;
            return None;
        }
        self.consecutive += 1;
        if self.consecutive >= self.limit {
            self.consecutive = 0;
            return Some(self.backoff);
        }
        None
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Time from `now` until the schedule's next firing.
pub fn next_delay(schedule: &Schedule, now: DateTime<Utc>) -> Option<Duration> {
    let next = schedule.after(&now).next()?;
    Some((next - now).to_std().unwrap_or(Duration::ZERO))
}

/// Background cycle daemon.
pub struct HeartbeatDaemon {
    orchestrator: Arc<Orchestrator>,
    schedule: Schedule,
    failures: FailureTracker,
}

impl HeartbeatDaemon {
    pub fn new(orchestrator: Arc<Orchestrator>, config: &DaemonConfig) -> Result<Self> {
        let schedule = Schedule::from_str(&config.schedule)
            .with_context(|| format!("Invalid cron schedule '{}'", config.schedule))?;
        info!("Heartbeat schedule: {}", config.schedule);

        Ok(Self {
            orchestrator,
            schedule,
            failures: FailureTracker::new(
                config.max_consecutive_failures,
                Duration::from_secs(config.backoff_secs),
            ),
        })
    }

    /// Run until `cancel` fires. A cycle in flight when it fires is aborted
    /// and journaled as a critical failure by the orchestrator.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!("Heartbeat daemon started");

        loop {
            let Some(wait) = next_delay(&self.schedule, Utc::now()) else {
                warn!("Cron schedule has no upcoming runs; stopping");
                return Ok(());
            };
            debug!("Next background cycle in {:?}", wait);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => {
                    info!("Heartbeat daemon shutting down");
                    return Ok(());
                }
            }

            let report = self
                .orchestrator
                .run_cycle(CycleRequest::background(), &cancel)
                .await;
            if cancel.is_cancelled() {
                info!("Heartbeat daemon shutting down");
                return Ok(());
            }

            if let Some(pause) = self.failures.record(report.status) {
                warn!(
                    "Background cycles keep failing; pausing for {}s",
                    pause.as_secs()
                );
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = cancel.cancelled() => {
                        info!("Heartbeat daemon shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn failures_trigger_backoff_at_the_limit() {
        let mut tracker = FailureTracker::new(3, Duration::from_secs(60));
        assert_eq!(tracker.record(CycleStatus::ToolError), None);
        assert_eq!(tracker.record(CycleStatus::OracleFailure), None);
        assert_eq!(tracker.consecutive(), 2);
        assert_eq!(
            tracker.record(CycleStatus::CriticalFailure),
            Some(Duration::from_secs(60))
        );
        assert_eq!(tracker.consecutive(), 0);
    }

    #[test]
    fn success_resets_the_count() {
        let mut tracker = FailureTracker::new(2, Duration::from_secs(5));
        tracker.record(CycleStatus::ToolError);
        tracker.record(CycleStatus::Success);
        assert_eq!(tracker.record(CycleStatus::ToolError), None);
    }

    #[test]
    fn delay_runs_to_the_next_slot() {
        let schedule = Schedule::from_str("0 */5 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 1, 30).unwrap();
        assert_eq!(next_delay(&schedule, now), Some(Duration::from_secs(210)));
    }

    #[test]
    fn rejects_bad_schedules() {
        let tv = crate::test_support::TestVault::new();
        let orchestrator = Arc::new(tv.orchestrator(Vec::new()));
        let config = DaemonConfig {
            schedule: "every five minutes".into(),
            ..DaemonConfig::default()
        };
        assert!(HeartbeatDaemon::new(orchestrator, &config).is_err());
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let tv = crate::test_support::TestVault::new();
        let orchestrator = Arc::new(tv.orchestrator(Vec::new()));
        let mut daemon = HeartbeatDaemon::new(orchestrator, &DaemonConfig::default()).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        daemon.run(cancel).await.unwrap();
        assert!(tv.journal_files().is_empty());
    }
}
