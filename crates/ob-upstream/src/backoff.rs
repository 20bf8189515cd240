//! Jittered exponential backoff for upstream call retries.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_total: Duration,
    pub backoff_factor: f64,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(cfg: &ob_domain::config::TranslationConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis((cfg.retry_backoff * 500.0) as u64),
            max_total: Duration::from_secs_f64(cfg.retry_max_seconds),
            backoff_factor: cfg.retry_backoff.max(1.0),
            max_attempts: cfg.retry_max_attempts,
        }
    }

    /// Compute the delay before the given (0-indexed) attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.backoff_factor.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_total.as_millis() as f64);
        let jitter = capped_ms * 0.25 * pseudo_random_fraction(attempt);
        Duration::from_millis((capped_ms + jitter) as u64)
    }

    pub fn should_give_up(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }
}

/// Cheap deterministic "random" fraction in `[0, 1)`, seeded by attempt
/// number. Not cryptographically secure — just enough to spread retry
/// storms across concurrent requests.
fn pseudo_random_fraction(attempt: u32) -> f64 {
    let hash = attempt.wrapping_mul(2654435761);
    (hash as f64) / (u32::MAX as f64)
}

/// Whether an HTTP status is worth retrying: connection/read failures are
/// handled by the caller before this is consulted; this covers the
/// response-received case.
pub fn is_retriable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}
