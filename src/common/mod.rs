//! Common types shared across the application.

pub mod error;
pub mod types;

pub use error::{AppError, BindError, ConfigError, DispatchError, ResolveError, TransportError};
pub use types::{ComponentId, HandlerId};
