use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Upper bound for the rate limit window and the feedback TTL (30 days).
pub const MAX_WINDOW_MS: u64 = 30 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
    pub rate_limit_enabled: bool,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,
    pub rate_limit_store_timeout_ms: u64,
    pub local_sweep_interval_secs: u64,
    pub dedup_max_tracked: usize,
    pub feedback_enabled: bool,
    pub feedback_ttl_ms: u64,
    pub chat_backend_url: String,
    pub chat_timeout_secs: u64,
    pub messenger_url: String,
    pub keep_alive_interval_secs: u64,
    pub metrics_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".into(),
            server_port: 3000,
            redis_url: None,
            redis_key_prefix: "relay-bot".into(),
            rate_limit_enabled: true,
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 30,
            rate_limit_store_timeout_ms: 1_000,
            local_sweep_interval_secs: 300,
            dedup_max_tracked: 100,
            feedback_enabled: true,
            feedback_ttl_ms: 600_000,
            chat_backend_url: String::new(),
            chat_timeout_secs: 60,
            messenger_url: String::new(),
            keep_alive_interval_secs: 5,
            metrics_queue_capacity: 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable source, then validates it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let config = Config {
            server_host: lookup("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port)?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            redis_key_prefix: lookup("REDIS_KEY_PREFIX").unwrap_or(defaults.redis_key_prefix),
            rate_limit_enabled: parse_or(&lookup, "RATE_LIMIT_ENABLED", defaults.rate_limit_enabled)?,
            rate_limit_window_ms: parse_or(&lookup, "RATE_LIMIT_WINDOW_MS", defaults.rate_limit_window_ms)?,
            rate_limit_max_requests: parse_or(
                &lookup,
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            )?,
            rate_limit_store_timeout_ms: parse_or(
                &lookup,
                "RATE_LIMIT_STORE_TIMEOUT_MS",
                defaults.rate_limit_store_timeout_ms,
            )?,
            local_sweep_interval_secs: parse_or(
                &lookup,
                "LOCAL_SWEEP_INTERVAL_SECS",
                defaults.local_sweep_interval_secs,
            )?,
            dedup_max_tracked: parse_or(&lookup, "DEDUP_MAX_TRACKED", defaults.dedup_max_tracked)?,
            feedback_enabled: parse_or(&lookup, "FEEDBACK_ENABLED", defaults.feedback_enabled)?,
            feedback_ttl_ms: parse_or(&lookup, "FEEDBACK_TTL_MS", defaults.feedback_ttl_ms)?,
            chat_backend_url: lookup("CHAT_BACKEND_URL")
                .ok_or(ConfigError::Missing("CHAT_BACKEND_URL"))?,
            chat_timeout_secs: parse_or(&lookup, "CHAT_TIMEOUT_SECS", defaults.chat_timeout_secs)?,
            messenger_url: lookup("MESSENGER_URL").ok_or(ConfigError::Missing("MESSENGER_URL"))?,
            keep_alive_interval_secs: parse_or(
                &lookup,
                "KEEP_ALIVE_INTERVAL_SECS",
                defaults.keep_alive_interval_secs,
            )?,
            metrics_queue_capacity: parse_or(
                &lookup,
                "METRICS_QUEUE_CAPACITY",
                defaults.metrics_queue_capacity,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the limiter or the correlator degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_window_ms == 0 {
            return Err(ConfigError::Rejected("rate limit window must be greater than zero".into()));
        }
        if self.rate_limit_window_ms > MAX_WINDOW_MS {
            return Err(ConfigError::Rejected(format!(
                "rate limit window must not exceed {} ms",
                MAX_WINDOW_MS
            )));
        }
        if self.feedback_ttl_ms == 0 {
            return Err(ConfigError::Rejected("feedback TTL must be greater than zero".into()));
        }
        if self.feedback_ttl_ms > MAX_WINDOW_MS {
            return Err(ConfigError::Rejected(format!(
                "feedback TTL must not exceed {} ms",
                MAX_WINDOW_MS
            )));
        }
        if self.rate_limit_store_timeout_ms == 0 {
            return Err(ConfigError::Rejected("rate limit store timeout must be greater than zero".into()));
        }
        if self.dedup_max_tracked == 0 {
            return Err(ConfigError::Rejected("dedup capacity must be greater than zero".into()));
        }
        if self.local_sweep_interval_secs == 0 || self.keep_alive_interval_secs == 0 {
            return Err(ConfigError::Rejected("timer intervals must be greater than zero".into()));
        }
        if self.chat_timeout_secs == 0 {
            return Err(ConfigError::Rejected("chat timeout must be greater than zero".into()));
        }
        if self.metrics_queue_capacity == 0 {
            return Err(ConfigError::Rejected("metrics queue capacity must be greater than zero".into()));
        }
        if self.chat_backend_url.trim().is_empty() {
            return Err(ConfigError::Missing("CHAT_BACKEND_URL"));
        }
        if self.messenger_url.trim().is_empty() {
            return Err(ConfigError::Missing("MESSENGER_URL"));
        }
        if self.rate_limit_enabled && self.rate_limit_max_requests == 0 {
            tracing::warn!("RATE_LIMIT_MAX_REQUESTS is 0, every request will be denied");
        }
        Ok(())
    }

    pub fn rate_limit_store_timeout(&self) -> Duration {
        Duration::from_millis(self.rate_limit_store_timeout_ms)
    }

    pub fn local_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.local_sweep_interval_secs)
    }

    pub fn feedback_ttl(&self) -> Duration {
        Duration::from_millis(self.feedback_ttl_ms)
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_secs)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name,
            value: raw,
        }),
        None => Ok(default),
    }
}
