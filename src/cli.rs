//! CLI argument parsing for http-observe

use crate::config::{
    normalize_prefix, ConfigError, ObserveConfig, DEFAULT_BIND, DEFAULT_DEBUG_TARGET,
    DEFAULT_PREFIX, ENV_BIND, ENV_DEBUG_TARGET, ENV_MAX_BODY, ENV_MAX_LOGS, ENV_PREFIX,
};
use crate::broadcaster::{DEFAULT_QUEUE_CAPACITY, HEARTBEAT_INTERVAL};
use crate::hub::{DEFAULT_CAPACITY, DEFAULT_MAX_BODY_BYTES};
use clap::Parser;
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "http-observe")]
#[command(version)]
#[command(about = "Record outbound HTTP calls and stream them live to observers", long_about = None)]
pub struct Cli {
    /// Maximum number of retained call records
    #[arg(long = "max-logs", env = ENV_MAX_LOGS, value_name = "N", default_value_t = DEFAULT_CAPACITY)]
    pub max_logs: usize,

    /// Maximum captured body size in bytes (default: 16 MiB)
    #[arg(long = "max-body", env = ENV_MAX_BODY, value_name = "BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body: usize,

    /// Frames buffered per live observer before the oldest are dropped
    /// (rounded up to a power of two, at most 65536)
    #[arg(long = "queue-capacity", value_name = "FRAMES", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Address the query and stream endpoints listen on
    #[arg(long = "bind", env = ENV_BIND, value_name = "ADDR", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Path prefix for all routes
    #[arg(long = "prefix", env = ENV_PREFIX, value_name = "PATH", default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Target of the /debug/make self-test call
    #[arg(long = "debug-target", env = ENV_DEBUG_TARGET, value_name = "URL", default_value = DEFAULT_DEBUG_TARGET)]
    pub debug_target: String,

    /// Enable debug tracing output (to stderr)
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Validated configuration from the parsed arguments
    pub fn into_config(self) -> Result<ObserveConfig, ConfigError> {
        let config = ObserveConfig {
            max_logs: self.max_logs,
            max_body_bytes: self.max_body,
            observer_queue_capacity: self.queue_capacity,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            bind: self.bind,
            route_prefix: normalize_prefix(&self.prefix),
            debug_target: self.debug_target,
        };
        config.validate()?;
        Ok(config)
    }
}
