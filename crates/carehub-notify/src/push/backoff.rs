//! Reconnect delays

use crate::config::ReconnectStrategy;
use std::time::Duration;

/// Delay schedule between reconnect attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// How the delay grows
    pub strategy: ReconnectStrategy,
    /// Delay before the first retry
    pub initial: Duration,
    /// Cap for linear/exponential growth
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::Exponential,
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strategy(mut self, strategy: ReconnectStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    pub fn max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.initial;

        let calculated = match self.strategy {
            ReconnectStrategy::Fixed => Some(base),
            ReconnectStrategy::Exponential => base.checked_mul(2_u32.saturating_pow(attempt)),
            ReconnectStrategy::Linear => base.checked_mul(attempt.saturating_add(1)),
        };

        calculated.unwrap_or(self.max).min(self.max)
    }
}
