//! Meeting status poller
//!
//! Watches one meeting until it reaches a terminal state. The original
//! behavior is a coarse polling loop: meetings end at unpredictable but
//! bounded times, so waits grow to a fixed ceiling that bounds worst-case
//! staleness while amortizing API-rate cost.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::observability::Metrics;
use crate::provider::{MeetingProvider, MeetingStatus};

/// Poll ceilings and waits; operational judgment calls, all configurable
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Consecutive fetch failures tolerated before giving up
    pub not_found_limit: u32,
    /// Iterations a still-running meeting is watched before giving up
    pub ongoing_limit: u32,
    pub first_wait: Duration,
    pub second_wait: Duration,
    pub ceiling_wait: Duration,
    /// Wait after a fetch failure or an unknown status
    pub failure_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            not_found_limit: 5,
            ongoing_limit: 20,
            first_wait: Duration::from_secs(120),
            second_wait: Duration::from_secs(240),
            ceiling_wait: Duration::from_secs(480),
            failure_wait: Duration::from_secs(480),
        }
    }
}

impl PollPolicy {
    /// Wait before re-checking a meeting that is still running. Not
    /// exponential: the third step is a fixed ceiling.
    pub fn ongoing_wait(&self, attempt: u32) -> Duration {
        match attempt {
            0 | 1 => self.first_wait,
            2 => self.second_wait,
            _ => self.ceiling_wait,
        }
    }
}

/// Poll states. The first is the only non-terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Checking,
    EndedOrWaiting,
    NotFound,
    GaveUpOngoing,
}

/// Terminal result of a poll run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Meeting ended or never started; recordings can be fetched
    EndedOrWaiting,
    /// Status fetch kept failing; meeting is unreachable
    NotFound,
    /// Meeting was still live after the ongoing ceiling
    GaveUpOngoing,
}

pub struct MeetingStatusPoller {
    provider: Arc<dyn MeetingProvider>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
    metrics: Arc<Metrics>,
}

impl MeetingStatusPoller {
    pub fn new(
        provider: Arc<dyn MeetingProvider>,
        clock: Arc<dyn Clock>,
        policy: PollPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            provider,
            clock,
            policy,
            metrics,
        }
    }

    /// Drive the state machine for one (email, meeting id) pair until a
    /// terminal state is reached.
    pub async fn poll_until_terminal(&self, email: &str, meeting_id: &str) -> PollOutcome {
        let mut state = PollState::Checking;
        let mut not_found_attempts: u32 = 0;
        let mut ongoing_attempts: u32 = 0;

        loop {
            match state {
                PollState::EndedOrWaiting => return PollOutcome::EndedOrWaiting,
                PollState::NotFound => return PollOutcome::NotFound,
                PollState::GaveUpOngoing => return PollOutcome::GaveUpOngoing,
                PollState::Checking => {}
            }

            self.metrics.poll_iteration();

            match self.provider.meeting_info(email, meeting_id).await {
                Err(e) => {
                    not_found_attempts += 1;
                    if not_found_attempts >= self.policy.not_found_limit {
                        warn!(
                            meeting_id,
                            attempts = not_found_attempts,
                            error = %e,
                            "Meeting status unavailable, giving up"
                        );
                        state = PollState::NotFound;
                        continue;
                    }
                    debug!(
                        meeting_id,
                        attempts = not_found_attempts,
                        error = %e,
                        "Meeting status fetch failed, will retry"
                    );
                    self.clock.sleep(self.policy.failure_wait).await;
                }
                Ok(info) => match info.status {
                    MeetingStatus::Ended | MeetingStatus::Waiting => {
                        info!(meeting_id, email, status = ?info.status, "Meeting over, handing off to recording fetch");
                        state = PollState::EndedOrWaiting;
                    }
                    MeetingStatus::Started => {
                        ongoing_attempts += 1;
                        if ongoing_attempts > self.policy.ongoing_limit {
                            warn!(
                                meeting_id,
                                email,
                                attempts = ongoing_attempts,
                                "Meeting still ongoing after retry ceiling, giving up"
                            );
                            state = PollState::GaveUpOngoing;
                            continue;
                        }
                        let wait = self.policy.ongoing_wait(ongoing_attempts);
                        debug!(
                            meeting_id,
                            attempts = ongoing_attempts,
                            wait_secs = wait.as_secs(),
                            "Meeting still ongoing"
                        );
                        self.clock.sleep(wait).await;
                    }
                    MeetingStatus::Unknown => {
                        debug!(meeting_id, "Unknown meeting status, will re-check");
                        self.clock.sleep(self.policy.failure_wait).await;
                    }
                },
            }
        }
    }
}
