//! When to retry the relay connection after it closes
//!
//! The default is a fixed two second delay with no attempt limit. Backoff and
//! a bounded attempt count are opt-in.

use std::time::Duration;

/// Delay between a close and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
    exponential: bool,
    max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    /// Retry after the same delay every time.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            exponential: false,
            max_attempts: None,
        }
    }

    /// Double the delay after every failed attempt, never exceeding `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            exponential: true,
            max_attempts: None,
        }
    }

    /// Stop retrying after `attempts` consecutive failures.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (0 for the first retry after a
    /// close), or `None` once the attempts are used up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }

        if !self.exponential {
            return Some(self.initial);
        }

        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.initial.saturating_mul(factor).min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retries_forever_every_two_seconds() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.max_attempts(), None);
        for attempt in [0, 1, 7, 1_000, u32::MAX] {
            assert_eq!(policy.delay_for(attempt), Some(Duration::from_secs(2)));
        }
    }

    #[test]
    fn exponential_doubles_up_to_the_cap() {
        let policy =
            ReconnectPolicy::exponential(Duration::from_millis(250), Duration::from_secs(3));

        assert_eq!(policy.delay_for(0), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_secs(3)));
        assert_eq!(policy.delay_for(40), Some(Duration::from_secs(3)));
    }

    #[test]
    fn bounded_policy_gives_up() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(10)).with_max_attempts(2);

        assert_eq!(policy.delay_for(0), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for(2), None);
    }
}
