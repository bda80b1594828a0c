//! Configuration for the analytics engine and its monitor tasks

use crate::error::{AdvisorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for market data access, analytics and monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cache TTL for instrument snapshots (quotes, prices)
    pub cache_ttl_realtime: Duration,

    /// Cache TTL for price histories
    pub cache_ttl_history: Duration,

    /// Maximum number of attempts for a rate-limited call
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Upper bound for a single backoff
    pub retry_backoff_max: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Outbound requests per minute allowed to the quote provider
    pub requests_per_minute: u32,

    /// Alpha Vantage API key (optional, enables sector / cap / P/E metadata)
    pub alpha_vantage_api_key: Option<String>,

    /// Minimum number of history points required by the calculator
    pub min_history_points: usize,

    /// RSI look-back in periods
    pub rsi_period: usize,

    /// Short moving-average window for trend detection
    pub trend_short_window: usize,

    /// Long moving-average window for trend detection
    pub trend_long_window: usize,

    /// Relative gap between short and long averages below which the trend is sideways
    pub trend_noise_threshold: f64,

    /// Fast EMA period of the MACD line
    pub macd_fast_period: usize,

    /// Slow EMA period of the MACD line
    pub macd_slow_period: usize,

    /// Window for support / resistance extrema
    pub support_resistance_window: usize,

    /// Days of history requested for stock analysis
    pub analysis_history_days: u32,

    /// Sector allocation (percent) above which a portfolio is flagged as concentrated
    pub concentration_threshold_pct: f64,

    /// Retention cap for each monitor task's alert log
    pub max_alerts_per_task: usize,

    /// Consecutive all-symbol failures before a task is marked failed
    pub max_consecutive_failures: u32,

    /// Smallest polling interval accepted by `start`
    pub min_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_realtime: Duration::from_secs(60),   // 1 minute
            cache_ttl_history: Duration::from_secs(3600),  // 1 hour
            max_retries: 3,
            retry_backoff_base: Duration::from_secs(1),
            retry_backoff_max: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            requests_per_minute: 120,
            alpha_vantage_api_key: None,
            min_history_points: 15,
            rsi_period: 14,
            trend_short_window: 10,
            trend_long_window: 30,
            trend_noise_threshold: 0.005,
            macd_fast_period: 12,
            macd_slow_period: 26,
            support_resistance_window: 20,
            analysis_history_days: 90,
            concentration_threshold_pct: 50.0,
            max_alerts_per_task: 100,
            max_consecutive_failures: 3,
            min_poll_interval: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Overlay settings from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay settings read through `lookup` on top of the defaults.
    ///
    /// Recognised keys: `ALPHA_VANTAGE_API_KEY`, `FADVISOR_REQUESTS_PER_MINUTE`,
    /// `FADVISOR_MAX_RETRIES`, `FADVISOR_REQUEST_TIMEOUT_SECS`,
    /// `FADVISOR_CONCENTRATION_THRESHOLD`, `FADVISOR_MAX_ALERTS`,
    /// `FADVISOR_MAX_CONSECUTIVE_FAILURES`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("ALPHA_VANTAGE_API_KEY").filter(|k| !k.is_empty()) {
            config.alpha_vantage_api_key = Some(key);
        }
        if let Some(v) = lookup("FADVISOR_REQUESTS_PER_MINUTE") {
            config.requests_per_minute = parse_var("FADVISOR_REQUESTS_PER_MINUTE", &v)?;
        }
        if let Some(v) = lookup("FADVISOR_MAX_RETRIES") {
            config.max_retries = parse_var("FADVISOR_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("FADVISOR_REQUEST_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_var("FADVISOR_REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("FADVISOR_CONCENTRATION_THRESHOLD") {
            config.concentration_threshold_pct =
                parse_var("FADVISOR_CONCENTRATION_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("FADVISOR_MAX_ALERTS") {
            config.max_alerts_per_task = parse_var("FADVISOR_MAX_ALERTS", &v)?;
        }
        if let Some(v) = lookup("FADVISOR_MAX_CONSECUTIVE_FAILURES") {
            config.max_consecutive_failures =
                parse_var("FADVISOR_MAX_CONSECUTIVE_FAILURES", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(config_error("max_retries must be greater than 0"));
        }
        if self.requests_per_minute == 0 {
            return Err(config_error("requests_per_minute must be greater than 0"));
        }
        if self.rsi_period == 0 {
            return Err(config_error("rsi_period must be greater than 0"));
        }
        if self.min_history_points < self.rsi_period + 1 {
            return Err(config_error(
                "min_history_points must cover the RSI period plus one point",
            ));
        }
        if self.trend_short_window == 0 || self.trend_short_window >= self.trend_long_window {
            return Err(config_error(
                "trend_short_window must be non-zero and shorter than trend_long_window",
            ));
        }
        if self.macd_fast_period == 0 || self.macd_fast_period >= self.macd_slow_period {
            return Err(config_error(
                "macd_fast_period must be non-zero and shorter than macd_slow_period",
            ));
        }
        if self.support_resistance_window == 0 {
            return Err(config_error("support_resistance_window must be greater than 0"));
        }
        if !(self.trend_noise_threshold >= 0.0 && self.trend_noise_threshold.is_finite()) {
            return Err(config_error("trend_noise_threshold must be a non-negative number"));
        }
        if !(self.concentration_threshold_pct > 0.0 && self.concentration_threshold_pct <= 100.0)
        {
            return Err(config_error(
                "concentration_threshold_pct must be within (0, 100]",
            ));
        }
        if self.max_alerts_per_task == 0 {
            return Err(config_error("max_alerts_per_task must be greater than 0"));
        }
        if self.max_consecutive_failures == 0 {
            return Err(config_error("max_consecutive_failures must be greater than 0"));
        }
        if self.min_poll_interval.is_zero() {
            return Err(config_error("min_poll_interval must be greater than zero"));
        }

        Ok(())
    }
}

fn config_error(msg: &str) -> AdvisorError {
    AdvisorError::ConfigError(msg.to_string())
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AdvisorError::ConfigError(format!("invalid value for {key}: {value}")))
}

/// Builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    cache_ttl_realtime: Option<Duration>,
    cache_ttl_history: Option<Duration>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    retry_backoff_max: Option<Duration>,
    request_timeout: Option<Duration>,
    requests_per_minute: Option<u32>,
    alpha_vantage_api_key: Option<String>,
    min_history_points: Option<usize>,
    concentration_threshold_pct: Option<f64>,
    max_alerts_per_task: Option<usize>,
    max_consecutive_failures: Option<u32>,
    min_poll_interval: Option<Duration>,
}

impl EngineConfigBuilder {
    /// Set cache TTL for instrument snapshots
    pub fn cache_ttl_realtime(mut self, duration: Duration) -> Self {
        self.cache_ttl_realtime = Some(duration);
        self
    }

    /// Set cache TTL for price histories
    pub fn cache_ttl_history(mut self, duration: Duration) -> Self {
        self.cache_ttl_history = Some(duration);
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set the backoff cap
    pub fn retry_backoff_max(mut self, duration: Duration) -> Self {
        self.retry_backoff_max = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set outbound request rate
    pub fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = Some(rpm);
        self
    }

    /// Set Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Load Alpha Vantage API key from environment
    pub fn with_env_api_key(mut self) -> Self {
        if let Ok(key) = std::env::var("ALPHA_VANTAGE_API_KEY") {
            self.alpha_vantage_api_key = Some(key);
        }
        self
    }

    /// Set the calculator's minimum history length
    pub fn min_history_points(mut self, points: usize) -> Self {
        self.min_history_points = Some(points);
        self
    }

    /// Set the sector concentration threshold (percent)
    pub fn concentration_threshold_pct(mut self, pct: f64) -> Self {
        self.concentration_threshold_pct = Some(pct);
        self
    }

    /// Set the alert log retention cap
    pub fn max_alerts_per_task(mut self, cap: usize) -> Self {
        self.max_alerts_per_task = Some(cap);
        self
    }

    /// Set the consecutive failure threshold
    pub fn max_consecutive_failures(mut self, ticks: u32) -> Self {
        self.max_consecutive_failures = Some(ticks);
        self
    }

    /// Set the minimum polling interval
    pub fn min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = Some(interval);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            cache_ttl_realtime: self.cache_ttl_realtime.unwrap_or(defaults.cache_ttl_realtime),
            cache_ttl_history: self.cache_ttl_history.unwrap_or(defaults.cache_ttl_history),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            retry_backoff_max: self.retry_backoff_max.unwrap_or(defaults.retry_backoff_max),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            requests_per_minute: self.requests_per_minute.unwrap_or(defaults.requests_per_minute),
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            min_history_points: self.min_history_points.unwrap_or(defaults.min_history_points),
            concentration_threshold_pct: self
                .concentration_threshold_pct
                .unwrap_or(defaults.concentration_threshold_pct),
            max_alerts_per_task: self.max_alerts_per_task.unwrap_or(defaults.max_alerts_per_task),
            max_consecutive_failures: self
                .max_consecutive_failures
                .unwrap_or(defaults.max_consecutive_failures),
            min_poll_interval: self.min_poll_interval.unwrap_or(defaults.min_poll_interval),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.min_history_points, 15);
        assert_eq!(config.max_alerts_per_task, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .max_retries(5)
            .request_timeout(Duration::from_secs(60))
            .min_poll_interval(Duration::from_millis(10))
            .build()
            .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.min_poll_interval, Duration::from_millis(10));
        assert_eq!(config.rsi_period, 14);
    }

    #[test]
    fn test_validation_rejects_short_history_window() {
        let result = EngineConfig::builder().min_history_points(10).build();
        assert!(matches!(result, Err(AdvisorError::ConfigError(_))));
    }

    #[test]
    fn test_validation_rejects_bad_threshold() {
        let config = EngineConfig {
            concentration_threshold_pct: 120.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = EngineConfig::from_lookup(|key| match key {
            "ALPHA_VANTAGE_API_KEY" => Some("demo".to_string()),
            "FADVISOR_MAX_ALERTS" => Some("25".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.alpha_vantage_api_key.as_deref(), Some("demo"));
        assert_eq!(config.max_alerts_per_task, 25);
    }

    #[test]
    fn test_from_lookup_invalid_number() {
        let result = EngineConfig::from_lookup(|key| {
            (key == "FADVISOR_MAX_RETRIES").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(AdvisorError::ConfigError(msg)) if msg.contains("FADVISOR_MAX_RETRIES")));
    }
}
