//! Error types for the application.

use thiserror::Error;

use crate::common::types::ComponentId;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors raised while turning a descriptor into an endpoint.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolver has no parsing strategy for interface descriptors.
    #[error("No interface resolution strategy for '{interface}'")]
    NotImplemented { interface: String },

    #[error("Malformed interface '{interface}': {message}")]
    Malformed { interface: String, message: String },

    #[error("Unsupported scheme '{scheme}' for {role} endpoints")]
    UnsupportedScheme { scheme: String, role: String },
}

/// Errors raised by `Bridge::bind` and `Bridge::unbind`.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Endpoint {0} is not bound to this bridge")]
    NotBound(ComponentId),

    #[error("Endpoint {0} is already bound to this bridge")]
    AlreadyBound(ComponentId),

    #[error("Component {0} is not registered with the dispatcher")]
    NotRegistered(ComponentId),

    #[error("Component {id} cannot be bound: {reason}")]
    InvalidEndpoint { id: ComponentId, reason: &'static str },

    #[error("Transport failed to attach: {0}")]
    Transport(#[from] TransportError),
}

/// Transport attachment errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport '{name}' requires a tokio runtime")]
    NoRuntime { name: String },
}

/// Dispatcher loop errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatcher is already running")]
    AlreadyRunning,
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for bind operations.
pub type BindResult<T> = std::result::Result<T, BindError>;

/// Result type alias for resolution.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn bind_then_fail() -> Result<()> {
        let missing = ComponentId::next();
        Err(BindError::NotBound(missing))?;
        Ok(())
    }

    #[test]
    fn test_errors_convert_upwards() {
        let err = bind_then_fail().unwrap_err();
        assert!(matches!(err, AppError::Bind(BindError::NotBound(_))));
        assert!(err.to_string().starts_with("Bind error: Endpoint #"));

        let resolve: BindError = ResolveError::NotImplemented {
            interface: "x".to_string(),
        }
        .into();
        assert_eq!(
            resolve.to_string(),
            "Resolution failed: No interface resolution strategy for 'x'"
        );
    }
}
