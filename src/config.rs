/*!
 * Configuration for the GitHub SCM adapter
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ScmError};
use scm_core_resilience::CircuitBreakerConfig;

/// Public GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Top-level adapter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmConfig {
    /// REST base URL (GitHub Enterprise: `https://ghe.example.com/api/v3`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Prefix of the commit status context label
    #[serde(default = "default_status_context")]
    pub status_context: String,

    #[serde(default)]
    pub breaker: BreakerSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ScmConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            status_context: default_status_context(),
            breaker: BreakerSettings::default(),
            retry: RetrySettings::default(),
            resolver: ResolverSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive transient failures that open the breaker
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,

    /// Optional failure fraction over the last `rate_window` calls
    #[serde(default)]
    pub failure_rate_threshold: Option<f64>,

    #[serde(default = "default_rate_window")]
    pub rate_window: usize,

    /// Half-open successes needed to close again
    #[serde(default = "default_success_threshold")]
    pub success_threshold: usize,

    /// Time spent open before a probe is allowed
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Upper bound for a single attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            failure_rate_threshold: None,
            rate_window: default_rate_window(),
            success_threshold: default_success_threshold(),
            cooldown_ms: default_cooldown_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Retry policy for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Extra random delay as a fraction of the backoff
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

/// Identity resolver cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Lifetime of a cached resolution; 0 disables caching
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl ResolverSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Diagnostic output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// Write JSON logs to this file instead of compact stderr output
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_user_agent() -> String {
    format!("scm-github/{}", env!("CARGO_PKG_VERSION"))
}

fn default_status_context() -> String {
    "Screwdriver".to_string()
}

fn default_failure_threshold() -> usize {
    5
}

fn default_rate_window() -> usize {
    20
}

fn default_success_threshold() -> usize {
    1
}

fn default_cooldown_ms() -> u64 {
    30_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_factor() -> f64 {
    0.2
}

fn default_cache_ttl_secs() -> u64 {
    60
}

impl ScmConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ScmError::Config(format!("{}: {}", path.display(), e)))?;
        let config: ScmConfig = toml::from_str(&contents)
            .map_err(|e| ScmError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ScmError::Config(e.to_string()))?;
        std::fs::write(path, contents)
            .map_err(|e| ScmError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Reject values the breaker and client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(ScmError::Config("api_url must not be empty".into()));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(ScmError::Config(
                "breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.breaker.success_threshold == 0 {
            return Err(ScmError::Config(
                "breaker.success_threshold must be at least 1".into(),
            ));
        }
        if self.breaker.timeout_ms == 0 {
            return Err(ScmError::Config("breaker.timeout_ms must be positive".into()));
        }
        if let Some(rate) = self.breaker.failure_rate_threshold {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ScmError::Config(format!(
                    "breaker.failure_rate_threshold must be in (0, 1], got {}",
                    rate
                )));
            }
            if self.breaker.rate_window == 0 {
                return Err(ScmError::Config(
                    "breaker.rate_window must be at least 1".into(),
                ));
            }
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ScmError::Config(
                "retry.backoff_multiplier must be at least 1.0".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.retry.jitter_factor) {
            return Err(ScmError::Config(format!(
                "retry.jitter_factor must be in [0, 1), got {}",
                self.retry.jitter_factor
            )));
        }
        Ok(())
    }

    /// Options structure for the gateway breaker
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker.failure_threshold,
            failure_rate_threshold: self.breaker.failure_rate_threshold,
            rate_window: self.breaker.rate_window,
            success_threshold: self.breaker.success_threshold,
            cooldown: Duration::from_millis(self.breaker.cooldown_ms),
            call_timeout: Duration::from_millis(self.breaker.timeout_ms),
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            backoff_multiplier: self.retry.backoff_multiplier,
            jitter_factor: self.retry.jitter_factor,
            max_retries: self.retry.max_retries,
        }
    }
}
