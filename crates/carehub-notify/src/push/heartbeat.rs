//! Liveness tracking for the push connection
//!
//! The listener pings on a fixed cadence and treats the connection as lost
//! once nothing at all has arrived for `interval + timeout`.

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Floor for the ping interval; a zero period would stall the timer
pub const MIN_PING_INTERVAL: Duration = Duration::from_millis(100);

/// Ping cadence for the push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between pings
    pub interval: Duration,
    /// Grace on top of `interval` before the connection counts as lost
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

impl HeartbeatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Longest silence tolerated on an open connection
    pub fn idle_limit(&self) -> Duration {
        self.ping_interval().saturating_add(self.timeout)
    }

    /// `interval`, raised to [`MIN_PING_INTERVAL`]
    pub fn ping_interval(&self) -> Duration {
        self.interval.max(MIN_PING_INTERVAL)
    }
}

/// Per-connection ping timer and silence deadline
#[derive(Debug)]
pub(crate) struct Heartbeat {
    ping: Interval,
    idle_limit: Duration,
    deadline: Instant,
}

impl Heartbeat {
    /// Start tracking a connection that just opened
    pub(crate) fn start(config: HeartbeatConfig) -> Self {
        let now = Instant::now();
        let period = config.ping_interval();
        let mut ping = tokio::time::interval_at(now + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            ping,
            idle_limit: config.idle_limit(),
            deadline: now + config.idle_limit(),
        }
    }

    /// Resolves when the next ping is due
    pub(crate) async fn ping_due(&mut self) {
        self.ping.tick().await;
    }

    /// When the connection counts as lost unless something arrives
    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Any inbound frame proves the peer is alive
    pub(crate) fn saw_activity(&mut self) {
        self.deadline = Instant::now() + self.idle_limit;
    }
}
