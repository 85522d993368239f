use std::time::Duration;

/// Exponential delay between restarts of a task that keeps failing.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    /// Delay after the first failure.
    pub first_ms: u64,
    /// Upper bound for any delay.
    pub max_ms: u64,
    /// Growth factor per consecutive failure.
    pub factor: f64,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self {
            first_ms: 1_000,
            max_ms: 60_000,
            factor: 2.0,
        }
    }
}

impl BackoffStrategy {
    /// Delay before the next start after `failures` consecutive failed or short-lived runs.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exp = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let ms = (self.first_ms as f64 * self.factor.powi(exp)).min(self.max_ms as f64);
        Duration::from_millis(ms as u64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.factor < 1.0 || !self.factor.is_finite() {
            return Err(format!("backoff factor must be >= 1.0, got {}", self.factor));
        }
        if self.first_ms > self.max_ms {
            return Err(format!(
                "backoff first delay {}ms exceeds max {}ms",
                self.first_ms, self.max_ms
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Time a container gets to exit after the stop signal before it is killed.
    pub stop_grace: Duration,
    pub restart_backoff: BackoffStrategy,
    /// Runs shorter than this count as failures for backoff purposes.
    pub flap_window: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(10),
            restart_backoff: BackoffStrategy::default(),
            flap_window: Duration::from_secs(60),
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.restart_backoff.validate()
    }
}
