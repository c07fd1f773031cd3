//! Reconnection backoff.

use std::time::Duration;

/// Delay before the first reconnection attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Reconnection attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff: attempt `n` waits `base_delay * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before attempt 1.
    pub base_delay: Duration,
    /// Attempts before the connection is given up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base_delay: DEFAULT_BASE_DELAY, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

impl ReconnectPolicy {
    /// Delay before `attempt` (1-based). `None` outside `1..=max_attempts`.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Every delay in the schedule, in attempt order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).filter_map(|attempt| self.delay_for(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule() {
        let delays: Vec<u128> =
            ReconnectPolicy::default().delays().map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn out_of_range_attempts() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), None);
        assert_eq!(policy.delay_for(6), None);
    }

    #[test]
    fn large_attempt_counts_saturate() {
        let policy = ReconnectPolicy { base_delay: Duration::from_secs(1), max_attempts: 64 };
        assert!(policy.delay_for(64).is_some());
    }
}
