//! Environment-driven configuration
//!
//! These tests mutate process environment variables, so they run serially.

use http_observe::config::{
    ConfigError, ObserveConfig, ENV_BIND, ENV_DEBUG_TARGET, ENV_MAX_BODY, ENV_MAX_LOGS,
    ENV_PREFIX,
};
use serial_test::serial;

const ALL_VARS: [&str; 5] = [ENV_MAX_LOGS, ENV_MAX_BODY, ENV_BIND, ENV_PREFIX, ENV_DEBUG_TARGET];

fn clear_env() {
    for var in ALL_VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = ObserveConfig::from_env().unwrap();
    assert_eq!(config, ObserveConfig::default());
    assert_eq!(config.max_logs, 1000);
    assert_eq!(config.max_body_bytes, 16 * 1024 * 1024);
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var(ENV_MAX_LOGS, "25");
    std::env::set_var(ENV_MAX_BODY, "2048");
    std::env::set_var(ENV_PREFIX, "/observe/");

    let config = ObserveConfig::from_env().unwrap();
    assert_eq!(config.max_logs, 25);
    assert_eq!(config.max_body_bytes, 2048);
    assert_eq!(config.route_prefix, "/observe");

    let hub = config.hub_config();
    assert_eq!(hub.capacity, 25);
    clear_env();
}

#[test]
#[serial]
fn test_from_env_rejects_garbage() {
    clear_env();
    std::env::set_var(ENV_MAX_BODY, "-5");
    assert!(matches!(
        ObserveConfig::from_env(),
        Err(ConfigError::InvalidNumber { var: ENV_MAX_BODY, .. })
    ));

    clear_env();
    std::env::set_var(ENV_BIND, "not-an-address");
    assert!(matches!(ObserveConfig::from_env(), Err(ConfigError::InvalidBind(_))));
    clear_env();
}
