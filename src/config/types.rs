//! Configuration type definitions.

use std::time::Duration;

use serde::Deserialize;

use crate::event::DispatcherSettings;
use crate::event::dispatcher::DEFAULT_MAX_EVENTS_PER_FLUSH;
use crate::transport::{ClientRetry, Role};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Interface descriptors bound at startup.
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// The public side of the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Public channel name.
    pub channel: String,
    /// "server" or "client"
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "server".to_string()
}

/// Dispatcher tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_max_events_per_flush")]
    pub max_events_per_flush: usize,
}

fn default_max_events_per_flush() -> usize {
    DEFAULT_MAX_EVENTS_PER_FLUSH
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_events_per_flush: DEFAULT_MAX_EVENTS_PER_FLUSH,
        }
    }
}

/// Application services running on the public channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Answer every read with a write of the same data.
    #[serde(default)]
    pub echo: bool,
    /// Log every event seen on the public channel.
    #[serde(default = "default_tap")]
    pub tap: bool,
}

fn default_tap() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            echo: false,
            tap: true,
        }
    }
}

/// Reconnect policy for client endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_retry_min_ms")]
    pub retry_min_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_retry_min_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    30_000
}

fn default_max_retries() -> usize {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry_min_ms: default_retry_min_ms(),
            retry_max_ms: default_retry_max_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl Config {
    /// Parsed bridge role, `None` if the string is not recognised.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.bridge.role)
    }

    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            max_events_per_flush: self.dispatcher.max_events_per_flush,
        }
    }

    pub fn client_retry(&self) -> ClientRetry {
        ClientRetry {
            min_delay: Duration::from_millis(self.client.retry_min_ms),
            max_delay: Duration::from_millis(self.client.retry_max_ms),
            max_retries: self.client.max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::load_config_str;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = load_config_str(r#"bridge { channel = "web" }"#).unwrap();

        assert_eq!(config.bridge.channel, "web");
        assert_eq!(config.role(), Some(Role::Server));
        assert!(config.endpoints.is_empty());
        assert!(!config.service.echo);
        assert!(config.service.tap);
        assert_eq!(
            config.dispatcher_settings().max_events_per_flush,
            DEFAULT_MAX_EVENTS_PER_FLUSH
        );
        assert_eq!(config.client_retry().min_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_full_config() {
        let config = load_config_str(
            r#"
            bridge {
              channel = "gateway"
              role = "client"
            }
            dispatcher {
              max_events_per_flush = 64
            }
            endpoints = ["tcp://127.0.0.1:8000", "memory://probe"]
            service {
              echo = true
              tap = false
            }
            client {
              retry_min_ms = 100
              retry_max_ms = 2000
              max_retries = 3
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.role(), Some(Role::Client));
        assert_eq!(config.endpoints.len(), 2);
        assert!(config.service.echo);
        assert!(!config.service.tap);
        assert_eq!(config.dispatcher_settings().max_events_per_flush, 64);

        let retry = config.client_retry();
        assert_eq!(retry.max_delay, Duration::from_secs(2));
        assert_eq!(retry.max_retries, 3);
    }
}
