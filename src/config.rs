//! Recorder configuration
//!
//! Values come from CLI flags, then environment variables, then defaults. The
//! binary gets the first two layers from clap (see [`crate::cli`]); embedders
//! that skip the CLI use [`ObserveConfig::from_env`].

use crate::broadcaster::{DEFAULT_QUEUE_CAPACITY, HEARTBEAT_INTERVAL, MAX_QUEUE_CAPACITY};
use crate::hub::{HubConfig, DEFAULT_CAPACITY, DEFAULT_MAX_BODY_BYTES};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const ENV_MAX_LOGS: &str = "HTTP_OBSERVE_MAX_LOGS";
pub const ENV_MAX_BODY: &str = "HTTP_OBSERVE_MAX_BODY";
pub const ENV_BIND: &str = "HTTP_OBSERVE_BIND";
pub const ENV_PREFIX: &str = "HTTP_OBSERVE_PREFIX";
pub const ENV_DEBUG_TARGET: &str = "HTTP_OBSERVE_DEBUG_TARGET";

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_PREFIX: &str = "/api/plugins/http-observe";
pub const DEFAULT_DEBUG_TARGET: &str = "https://httpbin.org/anything";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' (expected a non-negative integer)")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Invalid bind address '{0}'")]
    InvalidBind(String),

    #[error("Maximum retained records must be > 0")]
    ZeroMaxLogs,

    #[error("Maximum body size must be > 0")]
    ZeroMaxBody,

    #[error("Observer queue capacity must be > 0")]
    ZeroQueueCapacity,

    #[error("Observer queue capacity {value} exceeds the maximum of {max}")]
    QueueCapacityTooLarge { value: usize, max: usize },

    #[error("Route prefix must start with '/': '{0}'")]
    InvalidPrefix(String),
}

/// Complete recorder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveConfig {
    pub max_logs: usize,
    pub max_body_bytes: usize,
    pub observer_queue_capacity: usize,
    pub heartbeat_interval: Duration,
    pub bind: SocketAddr,
    pub route_prefix: String,
    /// Target of the `/debug/make` self-test call
    pub debug_target: String,
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            max_logs: DEFAULT_CAPACITY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            observer_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            route_prefix: DEFAULT_PREFIX.to_string(),
            debug_target: DEFAULT_DEBUG_TARGET.to_string(),
        }
    }
}

impl ObserveConfig {
    /// Read `HTTP_OBSERVE_*` variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_LOGS) {
            config.max_logs = parse_count(ENV_MAX_LOGS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_BODY) {
            config.max_body_bytes = parse_count(ENV_MAX_BODY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BIND) {
            config.bind = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidBind(raw.clone()))?;
        }
        if let Some(raw) = lookup(ENV_PREFIX) {
            config.route_prefix = raw;
        }
        if let Some(raw) = lookup(ENV_DEBUG_TARGET) {
            config.debug_target = raw;
        }

        config.route_prefix = normalize_prefix(&config.route_prefix);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_logs == 0 {
            return Err(ConfigError::ZeroMaxLogs);
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::ZeroMaxBody);
        }
        if self.observer_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.observer_queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::QueueCapacityTooLarge {
                value: self.observer_queue_capacity,
                max: MAX_QUEUE_CAPACITY,
            });
        }
        if !self.route_prefix.starts_with('/') {
            return Err(ConfigError::InvalidPrefix(self.route_prefix.clone()));
        }
        Ok(())
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            capacity: self.max_logs,
            max_body_bytes: self.max_body_bytes,
            observer_queue_capacity: self.observer_queue_capacity,
            heartbeat_interval: self.heartbeat_interval,
        }
    }
}

/// Strip trailing slashes; the root prefix stays `/`
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_count(var: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: raw.to_string(),
    })
}
