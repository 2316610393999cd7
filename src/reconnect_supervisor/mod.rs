//! Reconnect Supervisor
//!
//! Connection state machine with bounded, fixed-delay reconnects.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected (retry scheduled)
//!                                         -> Offline      (attempts exhausted)
//! ```
//!
//! - Each loss schedules one reconnect after `delay`, up to `max_attempts`
//!   consecutive attempts
//! - A loss after the last attempt is terminal: `Offline` until a manual reconnect
//! - A successful connect resets the attempt counter
//!
//! Pure state; the ingest loop owns the timers.

use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Attempts exhausted; only a manual reconnect leaves this state
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

/// What to do after a connection loss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reconnect after `delay`; `attempt` counts from 1
    Retry { attempt: u32, delay: Duration },
    /// No more automatic attempts
    Exhausted,
    /// Loss already handled (duplicate close/error, or already offline)
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempts: u32,
}

impl ReconnectSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive reconnect attempts since the last successful connect
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn connected(&mut self) {
        if self.attempts > 0 {
            tracing::info!(attempts = self.attempts, "Reconnected to broker");
        }
        self.state = ConnectionState::Connected;
        self.attempts = 0;
    }

    /// Close, error or failed connect
    pub fn lost(&mut self, reason: &str) -> ReconnectDecision {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Offline => ReconnectDecision::Ignored,
            ConnectionState::Connecting | ConnectionState::Connected => {
                if self.attempts >= self.policy.max_attempts {
                    self.state = ConnectionState::Offline;
                    tracing::error!(
                        attempts = self.attempts,
                        reason = %reason,
                        "Reconnect attempts exhausted; broker connection offline"
                    );
                    return ReconnectDecision::Exhausted;
                }

                self.state = ConnectionState::Disconnected;
                self.attempts += 1;
                tracing::warn!(
                    attempt = self.attempts,
                    max_attempts = self.policy.max_attempts,
                    delay_secs = self.policy.delay.as_secs(),
                    reason = %reason,
                    "Broker connection lost; reconnect scheduled"
                );
                ReconnectDecision::Retry {
                    attempt: self.attempts,
                    delay: self.policy.delay,
                }
            }
        }
    }

    /// Health re-check (e.g. dashboard foregrounded): reconnect now?
    ///
    /// Only a disconnected client reconnects early; `Offline` stays terminal.
    pub fn should_reconnect_now(&self) -> bool {
        self.state == ConnectionState::Disconnected
    }

    /// Operator-requested reconnect; clears the attempt budget
    pub fn manual_reconnect(&mut self) {
        tracing::info!(previous_state = ?self.state, "Manual reconnect requested");
        self.attempts = 0;
        self.state = ConnectionState::Disconnected;
    }
}

impl Default for ReconnectSupervisor {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
