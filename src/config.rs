//! Scheduler configuration with environment variable overrides.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic** — values set directly on [`SchedConfig`]
//! 2. **Environment variables** — values from `TRACESCHED_*` env vars
//! 3. **Defaults** — built-in defaults from [`SchedConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `TRACESCHED_WAIT_TICK_MS` | `u64` | `wait_tick` |
//! | `TRACESCHED_WAIT_WARN_MS` | `u64` | `wait_warn_after` |

use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable name for the blocked-wait re-check granularity.
pub const ENV_WAIT_TICK_MS: &str = "TRACESCHED_WAIT_TICK_MS";
/// Environment variable name for the slow-wait warning threshold.
pub const ENV_WAIT_WARN_MS: &str = "TRACESCHED_WAIT_WARN_MS";

/// Tunables for the scheduler's blocking behavior.
///
/// Both knobs exist for diagnosis, not correctness: waiters are woken by
/// condition-variable notification, and the tick only bounds how stale a
/// missed diagnostic can be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedConfig {
    /// How often a blocked waiter re-arms its wait to check the slow-wait
    /// clock. Does not affect wake-up latency.
    pub wait_tick: Duration,
    /// How long a test may stay blocked in one wait before a structured
    /// warning is emitted. A test stuck here usually means a participant
    /// never arrived at an open rendezvous point.
    pub wait_warn_after: Duration,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            wait_tick: Duration::from_millis(10),
            wait_warn_after: Duration::from_secs(5),
        }
    }
}

impl SchedConfig {
    /// Builds a configuration from defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `TRACESCHED_*` overrides to this configuration.
    ///
    /// Only variables that are set in the environment are applied.
    /// Returns an error if a variable is set but unparseable.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(val) = read_env(ENV_WAIT_TICK_MS) {
            self.wait_tick = Duration::from_millis(parse_millis(ENV_WAIT_TICK_MS, &val)?);
        }
        if let Some(val) = read_env(ENV_WAIT_WARN_MS) {
            self.wait_warn_after = Duration::from_millis(parse_millis(ENV_WAIT_WARN_MS, &val)?);
        }
        Ok(())
    }
}

fn read_env(var: &'static str) -> Option<String> {
    match std::env::var(var) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => None,
    }
}

fn parse_millis(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.parse::<u64>().map_err(|_| ConfigError::InvalidEnvValue {
        var,
        value: val.to_string(),
        expected: "a non-negative integer millisecond count",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::env_lock;

    #[test]
    fn defaults_are_sane() {
        let config = SchedConfig::default();
        assert_eq!(config.wait_tick, Duration::from_millis(10));
        assert!(config.wait_warn_after > config.wait_tick);
    }

    #[test]
    fn env_overrides_apply() {
        let _guard = env_lock();
        std::env::set_var(ENV_WAIT_TICK_MS, "25");
        std::env::set_var(ENV_WAIT_WARN_MS, "1000");
        let config = SchedConfig::from_env().expect("valid overrides");
        std::env::remove_var(ENV_WAIT_TICK_MS);
        std::env::remove_var(ENV_WAIT_WARN_MS);
        assert_eq!(config.wait_tick, Duration::from_millis(25));
        assert_eq!(config.wait_warn_after, Duration::from_millis(1000));
    }

    #[test]
    fn malformed_override_is_reported() {
        let _guard = env_lock();
        std::env::set_var(ENV_WAIT_TICK_MS, "soon");
        let err = SchedConfig::from_env().expect_err("unparseable value");
        std::env::remove_var(ENV_WAIT_TICK_MS);
        assert!(err.to_string().contains(ENV_WAIT_TICK_MS));
    }

    #[test]
    fn blank_override_is_ignored() {
        let _guard = env_lock();
        std::env::set_var(ENV_WAIT_WARN_MS, "  ");
        let config = SchedConfig::from_env().expect("blank is ignored");
        std::env::remove_var(ENV_WAIT_WARN_MS);
        assert_eq!(config, SchedConfig::default());
    }
}
