use std::time::Duration;

/// How many rounds over the candidate list, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Rounds over the full candidate list. At least one round always runs.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Bound on a single request.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed round `round` (0-based), or `None` when that
    /// was the last round.
    pub fn backoff_after(&self, round: u32) -> Option<Duration> {
        if round.saturating_add(1) >= self.rounds() {
            return None;
        }

        let factor = 2u32.checked_pow(round).unwrap_or(u32::MAX);
        let delay = self
            .initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff);

        Some(delay.min(self.max_backoff))
    }

    pub fn rounds(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
