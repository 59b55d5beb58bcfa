//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `SWITCHYARD_CHANNEL` - Public channel of the bridge
//! - `SWITCHYARD_ROLE` - Bridge role (server or client)
//! - `SWITCHYARD_ENDPOINTS` - Comma-separated interface descriptors
//! - `SWITCHYARD_ECHO` - Enable or disable the echo service

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "SWITCHYARD";

/// Apply environment variable overrides to a config.
pub fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, |key| env::var(format!("{}_{}", ENV_PREFIX, key)).ok())
}

fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(channel) = lookup("CHANNEL") {
        config.bridge.channel = channel;
    }
    if let Some(role) = lookup("ROLE") {
        config.bridge.role = role;
    }

    if let Some(endpoints) = lookup("ENDPOINTS") {
        config.endpoints = endpoints
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(echo) = lookup("ECHO") {
        if let Ok(echo) = echo.parse() {
            config.service.echo = echo;
        }
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `SWITCHYARD_CONFIG` environment variable, otherwise returns "switchyard.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "switchyard.conf".to_string())
}
