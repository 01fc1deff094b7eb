//! Engine configuration.
//!
//! Built through [`EngineConfigBuilder`] or from environment variables.
//! Invalid combinations are rejected at `build()` time rather than
//! surfacing as odd runtime behavior.

use chrono::Duration;
use std::time::Duration as StdDuration;
use thiserror::Error;
use veriflow_provider::resilience::RetryConfig;

/// Configuration error raised at build time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },
}

/// Engine-wide tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on how long an issued challenge stays answerable.
    /// Provider-issued expirations beyond this bound are clamped.
    pub challenge_ttl: Duration,
    /// How long a session may run before the sweep expires it.
    pub session_ttl: Duration,
    /// Risk-score increase between assessments that forces a step-up
    /// re-entry even when the assurance target is already met.
    pub risk_step_up_delta: f64,
    /// Retry behavior for transient provider failures within one
    /// challenge window.
    pub retry: RetryConfig,
    /// How often the background sweep looks for expired sessions.
    pub sweep_interval: StdDuration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            challenge_ttl: Duration::minutes(5),
            session_ttl: Duration::minutes(15),
            risk_step_up_delta: 0.25,
            retry: RetryConfig::default(),
            sweep_interval: StdDuration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Build from `VERIFLOW_*` environment variables, using defaults for
    /// anything unset.
    ///
    /// Recognized: `VERIFLOW_CHALLENGE_TTL_SECS`, `VERIFLOW_SESSION_TTL_SECS`,
    /// `VERIFLOW_RISK_STEP_UP_DELTA`, `VERIFLOW_MAX_PROVIDER_RETRIES`,
    /// `VERIFLOW_SWEEP_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        if let Some(secs) = read_env_u64("VERIFLOW_CHALLENGE_TTL_SECS")? {
            builder = builder.challenge_ttl_secs(secs as i64);
        }
        if let Some(secs) = read_env_u64("VERIFLOW_SESSION_TTL_SECS")? {
            builder = builder.session_ttl_secs(secs as i64);
        }
        if let Some(delta) = read_env_f64("VERIFLOW_RISK_STEP_UP_DELTA")? {
            builder = builder.risk_step_up_delta(delta);
        }
        if let Some(retries) = read_env_u64("VERIFLOW_MAX_PROVIDER_RETRIES")? {
            builder = builder.max_provider_retries(retries as u32);
        }
        if let Some(secs) = read_env_u64("VERIFLOW_SWEEP_INTERVAL_SECS")? {
            builder = builder.sweep_interval(StdDuration::from_secs(secs));
        }

        builder.build()
    }
}

fn read_env_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::Env {
                var,
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn read_env_f64(var: &'static str) -> Result<Option<f64>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|e| ConfigError::Env {
                var,
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    challenge_ttl: Option<Duration>,
    session_ttl: Option<Duration>,
    risk_step_up_delta: Option<f64>,
    max_provider_retries: Option<u32>,
    sweep_interval: Option<StdDuration>,
}

impl EngineConfigBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Challenge time-to-live in seconds.
    #[must_use]
    pub fn challenge_ttl_secs(mut self, secs: i64) -> Self {
        self.challenge_ttl = Some(Duration::seconds(secs));
        self
    }

    /// Session time-to-live in seconds.
    #[must_use]
    pub fn session_ttl_secs(mut self, secs: i64) -> Self {
        self.session_ttl = Some(Duration::seconds(secs));
        self
    }

    /// Risk increase that forces step-up re-entry.
    #[must_use]
    pub fn risk_step_up_delta(mut self, delta: f64) -> Self {
        self.risk_step_up_delta = Some(delta);
        self
    }

    /// Bound on transient provider retries per challenge window.
    #[must_use]
    pub fn max_provider_retries(mut self, retries: u32) -> Self {
        self.max_provider_retries = Some(retries);
        self
    }

    /// Interval of the background expiry sweep.
    #[must_use]
    pub fn sweep_interval(mut self, interval: StdDuration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineConfig::default();

        let challenge_ttl = self.challenge_ttl.unwrap_or(defaults.challenge_ttl);
        if challenge_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid {
                message: "challenge TTL must be positive".to_string(),
            });
        }

        let session_ttl = self.session_ttl.unwrap_or(defaults.session_ttl);
        if session_ttl < challenge_ttl {
            return Err(ConfigError::Invalid {
                message: "session TTL must be at least the challenge TTL".to_string(),
            });
        }

        let risk_step_up_delta = self
            .risk_step_up_delta
            .unwrap_or(defaults.risk_step_up_delta);
        if !(0.0..=1.0).contains(&risk_step_up_delta) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "risk step-up delta must be within [0.0, 1.0], got {risk_step_up_delta}"
                ),
            });
        }

        let mut retry = defaults.retry;
        if let Some(max_retries) = self.max_provider_retries {
            retry.max_retries = max_retries;
        }

        Ok(EngineConfig {
            challenge_ttl,
            session_ttl,
            risk_step_up_delta,
            retry,
            sweep_interval: self.sweep_interval.unwrap_or(defaults.sweep_interval),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config.challenge_ttl, Duration::minutes(5));
        assert_eq!(config.session_ttl, Duration::minutes(15));
    }

    #[test]
    fn rejects_zero_challenge_ttl() {
        let err = EngineConfig::builder().challenge_ttl_secs(0).build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_session_shorter_than_challenge() {
        let err = EngineConfig::builder()
            .challenge_ttl_secs(300)
            .session_ttl_secs(60)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_out_of_range_delta() {
        assert!(EngineConfig::builder()
            .risk_step_up_delta(1.5)
            .build()
            .is_err());
        assert!(EngineConfig::builder()
            .risk_step_up_delta(-0.1)
            .build()
            .is_err());
    }

    #[test]
    fn retry_bound_is_applied() {
        let config = EngineConfig::builder()
            .max_provider_retries(7)
            .build()
            .unwrap();
        assert_eq!(config.retry.max_retries, 7);
    }
}
