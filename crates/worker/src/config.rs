use std::time::Duration;

/// Scheduler timing, loaded from environment variables.
///
/// | Env var               | Default |
/// |-----------------------|---------|
/// | `HOST_CEILING_SECS`   | `300`   |
/// | `BUDGET_FRACTION`     | `0.9`   |
/// | `SCHEDULER_POLL_SECS` | `15`    |
/// | `STORE_TIMEOUT_SECS`  | `10`    |
/// | `SWEEP_INTERVAL_SECS` | `60`    |
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Hard limit the host puts on a single invocation.
    pub host_ceiling_secs: u64,
    /// Share of the ceiling a run may spend, in `(0, 1)`.
    pub budget_fraction: f64,
    pub poll_secs: u64,
    pub store_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            host_ceiling_secs: 300,
            budget_fraction: 0.9,
            poll_secs: 15,
            store_timeout_secs: 10,
            sweep_interval_secs: 60,
        }
    }
}

impl SchedulerConfig {
    /// # Panics
    ///
    /// Panics if a variable is set but unparseable, or if
    /// `BUDGET_FRACTION` is outside `(0, 1)`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host_ceiling_secs: u64 = std::env::var("HOST_CEILING_SECS")
            .ok()
            .map(|v| v.parse().expect("HOST_CEILING_SECS must be a valid u64"))
            .unwrap_or(defaults.host_ceiling_secs);

        let budget_fraction: f64 = std::env::var("BUDGET_FRACTION")
            .ok()
            .map(|v| v.parse().expect("BUDGET_FRACTION must be a number"))
            .unwrap_or(defaults.budget_fraction);
        assert!(
            budget_fraction > 0.0 && budget_fraction < 1.0,
            "BUDGET_FRACTION must be between 0 and 1 (exclusive)"
        );

        let poll_secs: u64 = std::env::var("SCHEDULER_POLL_SECS")
            .ok()
            .map(|v| v.parse().expect("SCHEDULER_POLL_SECS must be a valid u64"))
            .unwrap_or(defaults.poll_secs);

        let store_timeout_secs: u64 = std::env::var("STORE_TIMEOUT_SECS")
            .ok()
            .map(|v| v.parse().expect("STORE_TIMEOUT_SECS must be a valid u64"))
            .unwrap_or(defaults.store_timeout_secs);

        let sweep_interval_secs: u64 = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .map(|v| v.parse().expect("SWEEP_INTERVAL_SECS must be a valid u64"))
            .unwrap_or(defaults.sweep_interval_secs);

        Self {
            host_ceiling_secs,
            budget_fraction,
            poll_secs,
            store_timeout_secs,
            sweep_interval_secs,
        }
    }

    /// Wall-clock budget for one run, strictly below the host ceiling.
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.host_ceiling_secs).mul_f64(self.budget_fraction.clamp(0.0, 1.0))
    }

    /// A processing job older than this is presumed abandoned.
    pub fn stale_after(&self) -> Duration {
        self.budget() * 2
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_is_ninety_percent_of_ceiling() {
        let config = SchedulerConfig::default();
        assert_eq!(config.budget(), Duration::from_secs(270));
        assert_eq!(config.stale_after(), Duration::from_secs(540));
    }
}
