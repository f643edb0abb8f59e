use std::time::Duration;

use rand::Rng;

/// Poll cadence and failure-handling knobs shared by every watcher.
///
/// The source front-end polled at 10s on one page and 30s in its context
/// layer with no documented reason; 15s is the one canonical interval here.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Canonical recurring poll interval.
    pub interval_secs: u64,
    /// Upper bound for failure backoff.
    pub max_backoff_secs: u64,
    /// Consecutive failures before the degraded signal fires.
    pub degraded_threshold: u32,
    pub jitter_factor: f64,
    /// Bound on a single reconciliation fetch.
    pub fetch_timeout_secs: u64,
    /// How far ahead of token expiry the single-shot refresh fires.
    pub refresh_lead_secs: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            max_backoff_secs: 300,      // 5 minutes
            degraded_threshold: 3,
            jitter_factor: 0.1,         // ±10%
            fetch_timeout_secs: 10,
            refresh_lead_secs: 300,
        }
    }
}

impl PollPolicy {
    /// Delay before the next tick given the current consecutive-failure
    /// count. Healthy polling sticks to the canonical interval; failures
    /// back off exponentially with jitter so a struggling backend is not
    /// hammered in lockstep.
    /// Formula: delay = min(interval × 2^failures × (1 ± jitter), max)
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::from_secs(self.interval_secs);
        }

        let base = self.interval_secs as f64;
        let exponential = base * 2_f64.powi(consecutive_failures.min(16) as i32);

        let mut rng = rand::rng();
        let jitter = 1.0 + (rng.random::<f64>() * 2.0 - 1.0) * self.jitter_factor;
        let with_jitter = exponential * jitter;

        let capped = with_jitter.min(self.max_backoff_secs as f64);
        Duration::from_secs(capped.max(1.0) as u64)
    }

    pub fn is_degraded(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.degraded_threshold
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Timeout for one reconciliation fetch.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
