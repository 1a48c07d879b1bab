//! Dispatcher-level configuration: [`Config`], [`RetryPolicy`], and
//! [`ModeOverrides`].
//!
//! These are plain, directly-constructible structs — parsing them from a
//! config file or environment variables is left to callers, so this module
//! carries no loader, only a small builder in the teacher's
//! `config::builder` idiom.

use crate::types::Mode;
use std::collections::HashMap;
use std::time::Duration;

/// Backoff shape used between retry attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackoffStrategy {
    #[default]
    Exponential,
    Linear,
    Fixed,
}

/// Governs how the retry engine wraps a single adapter call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_strategy: BackoffStrategy,
    /// Error strings (matched by exact equality against `DispatchError::retry_key`)
    /// that should be retried, in addition to the engine's built-in defaults.
    pub retryable_errors: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_strategy: BackoffStrategy::Exponential,
            retryable_errors: Vec::new(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_strategy: BackoffStrategy) -> Self {
        Self {
            max_retries,
            backoff_strategy,
            retryable_errors: Vec::new(),
        }
    }

    pub fn with_retryable_error(mut self, error: impl Into<String>) -> Self {
        self.retryable_errors.push(error.into());
        self
    }
}

/// Per-mode overrides layered on top of the built-in mode defaults.
#[derive(Debug, Clone, Default)]
pub struct ModeOverrides {
    /// Ordered vendor-name preference lists, tried before the built-in defaults.
    pub vendor_preferences: HashMap<Mode, Vec<String>>,
    /// When set (and mode is `cost_saving`), candidates whose estimated cost
    /// exceeds this bound are skipped.
    pub max_cost_per_request: f64,
    /// Reserved for a future latency-aware strategy; not consulted by the
    /// built-in strategies today.
    pub max_latency: Duration,
}

impl ModeOverrides {
    pub fn with_vendor_preference(mut self, mode: Mode, vendors: Vec<String>) -> Self {
        self.vendor_preferences.insert(mode, vendors);
        self
    }

    pub fn with_max_cost_per_request(mut self, max_cost: f64) -> Self {
        self.max_cost_per_request = max_cost;
        self
    }
}

/// Top-level dispatcher configuration. Immutable after the [`crate::Dispatcher`]
/// is constructed, except for the statistics it accumulates.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default mode used when a request doesn't specify one explicitly.
    pub mode: Mode,
    /// When non-zero, every dispatch is bounded by this deadline in addition
    /// to whatever cancellation the caller supplies.
    pub timeout: Duration,
    /// Gates the dispatcher's own `tracing` events (not the adapters' —
    /// those log unconditionally at `debug`/`warn` and rely on the
    /// subscriber's own filtering).
    pub enable_logging: bool,
    /// Gates whether a dispatch updates [`crate::stats::StatsAggregator`].
    pub enable_metrics: bool,
    pub retry_policy: RetryPolicy,
    pub mode_overrides: ModeOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            timeout: Duration::ZERO,
            enable_logging: true,
            enable_metrics: true,
            retry_policy: RetryPolicy::default(),
            mode_overrides: ModeOverrides::default(),
        }
    }
}

/// Builder for [`Config`], mirroring the teacher's `ConfigBuilder` pattern.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    pub fn enable_metrics(mut self, enabled: bool) -> Self {
        self.config.enable_metrics = enabled;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    pub fn mode_overrides(mut self, overrides: ModeOverrides) -> Self {
        self.config.mode_overrides = overrides;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_expected_config() {
        let config = ConfigBuilder::new()
            .mode(Mode::Fast)
            .timeout(Duration::from_secs(30))
            .retry_policy(RetryPolicy::new(3, BackoffStrategy::Linear))
            .build();

        assert_eq!(config.mode, Mode::Fast);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry_policy.max_retries, 3);
    }

    #[test]
    fn default_retry_policy_is_single_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 0);
    }
}
