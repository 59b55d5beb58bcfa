//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::bridge::parse_interface;
use crate::common::error::ConfigError;
use crate::config::types::Config;
use crate::transport::DefaultTransportFactory;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Bridge
    if config.bridge.channel.is_empty() {
        errors.push("bridge.channel is required".to_string());
    }
    if config.bridge.channel.chars().any(char::is_whitespace) {
        errors.push(format!(
            "bridge.channel '{}' must not contain whitespace",
            config.bridge.channel
        ));
    }
    if config.role().is_none() {
        errors.push(format!(
            "bridge.role '{}' is invalid (use: server, client)",
            config.bridge.role
        ));
    }

    // Dispatcher
    if config.dispatcher.max_events_per_flush == 0 {
        errors.push("dispatcher.max_events_per_flush must be non-zero".to_string());
    }

    // Endpoints
    for (i, endpoint) in config.endpoints.iter().enumerate() {
        match parse_interface(endpoint) {
            Ok((context, _)) if !DefaultTransportFactory::supports(&context.scheme) => {
                errors.push(format!(
                    "endpoints[{}]: scheme '{}' is not supported (use: {})",
                    i,
                    context.scheme,
                    DefaultTransportFactory::SCHEMES.join(", ")
                ));
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("endpoints[{}]: {}", i, e)),
        }
    }

    // Client retry policy
    if config.client.retry_min_ms > config.client.retry_max_ms {
        errors.push(format!(
            "client.retry_min_ms ({}) must not exceed client.retry_max_ms ({})",
            config.client.retry_min_ms, config.client.retry_max_ms
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
