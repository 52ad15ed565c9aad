// src/config.rs

//! Configuration types for the queued limiter

// dependencies
use crate::errors::{ConfigError, QueuedLimiterError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Regeneration interval used when none is configured, in milliseconds.
pub const DEFAULT_INTERVAL_MS: f64 = 1000.0;

/// Token bucket shape: how many tokens regenerate per interval, the ceiling and
/// the starting pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Tokens added every interval.
    pub regen: f64,
    /// Maximum number of pooled tokens. Defaults to `regen`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Starting pool. Defaults to `max`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<f64>,
}

impl TokenConfig {
    pub fn new(regen: f64) -> Self {
        Self {
            regen,
            max: None,
            initial: None,
        }
    }

    /// Builder-style: set the pool ceiling
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Builder-style: set the starting pool
    pub fn initial(mut self, initial: f64) -> Self {
        self.initial = Some(initial);
        self
    }
}

/// Configuration for limiter behavior.
///
/// Exactly one of `tokens` or `requests` must be set. `requests: n` is shorthand
/// for `tokens: { regen: n }`, i.e. n single-token requests per interval.
///
/// ```rust
/// use queued_limiter::{QueuedLimiterConfig, TokenConfig};
///
/// let by_tokens = QueuedLimiterConfig::new()
///     .tokens(TokenConfig::new(10.0).max(10.0))
///     .interval(1000.0);
/// let by_requests = QueuedLimiterConfig::new().requests(10.0).interval(1000.0);
///
/// assert_eq!(by_tokens.resolve().unwrap(), by_requests.resolve().unwrap());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueuedLimiterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenConfig>,
    /// Regeneration period in milliseconds. Defaults to 1000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
}

/// Validated, fully defaulted settings a limiter runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterSettings {
    pub max_tokens: f64,
    pub regen_amount: f64,
    pub initial_tokens: f64,
    pub interval: Duration,
}

impl LimiterSettings {
    pub(crate) fn interval_nanos(&self) -> u64 {
        // sub-nanosecond intervals pass validation but cannot be measured
        u64::try_from(self.interval.as_nanos())
            .unwrap_or(u64::MAX)
            .max(1)
    }
}

impl QueuedLimiterConfig {
    /// Create an empty configuration. One of `tokens` or `requests` must be set
    /// before it validates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: set the request-rate shorthand
    pub fn requests(mut self, requests: f64) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Builder-style: set the token bucket shape
    pub fn tokens(mut self, tokens: TokenConfig) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Builder-style: set the regeneration interval in milliseconds
    pub fn interval(mut self, interval_ms: f64) -> Self {
        self.interval = Some(interval_ms);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), QueuedLimiterError> {
        self.resolve().map(|_| ())
    }

    /// Validate the configuration and fill in defaults.
    pub fn resolve(&self) -> Result<LimiterSettings, QueuedLimiterError> {
        let tokens = match (self.requests, &self.tokens) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingRate.into()),
            (Some(requests), None) => {
                finite("requests", requests)?;
                TokenConfig::new(requests)
            }
            (None, Some(tokens)) => tokens.clone(),
            (None, None) => return Err(ConfigError::MissingRate.into()),
        };

        let max_tokens = tokens.max.unwrap_or(tokens.regen);
        let interval_ms = self.interval.unwrap_or(DEFAULT_INTERVAL_MS);

        finite("tokens.max", max_tokens)?;
        finite("tokens.regen", tokens.regen)?;
        finite("interval", interval_ms)?;
        if let Some(initial) = tokens.initial {
            finite("tokens.initial", initial)?;
        }

        positive("tokens.max", max_tokens)?;
        positive("tokens.regen", tokens.regen)?;
        positive("interval", interval_ms)?;

        // the clock counts u64 nanoseconds, so the interval has to fit in one
        let interval = Duration::try_from_secs_f64(interval_ms / 1000.0)
            .ok()
            .filter(|interval| u64::try_from(interval.as_nanos()).is_ok())
            .ok_or(ConfigError::TooLarge { field: "interval" })?;

        Ok(LimiterSettings {
            max_tokens,
            regen_amount: tokens.regen,
            initial_tokens: tokens.initial.unwrap_or(max_tokens),
            interval,
        })
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field })
    }
}
