//! Concrete endpoints that a bridge can bind.
//!
//! A transport is constructed from a parsed [`ConnectionContext`] and then
//! attached to the dispatcher under its own component identity and private
//! channel. Attaching installs the transport's handlers and starts its I/O.
//!
//! ## Module Structure
//!
//! - `memory`: In-process endpoint that records what is delivered to it
//! - `tcp`: tokio TCP server and client endpoints

pub mod memory;
pub mod tcp;

use std::fmt;
use std::sync::Arc;

use crate::common::error::{ResolveError, ResolveResult, TransportError};
use crate::common::types::ComponentId;
use crate::event::Dispatcher;

pub use memory::{MemoryHub, MemoryLink, MemoryTransport};
pub use tcp::{ClientRetry, TcpClient, TcpServer};

/// Which side of a connection a bridge's endpoints play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    /// Parse a role from a config string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "server" | "listen" => Some(Role::Server),
            "client" | "connect" => Some(Role::Client),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construction parameters produced by parsing an interface descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionContext {
    pub scheme: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
}

impl fmt::Display for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(host) = &self.host {
            f.write_str(host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if let Some(path) = &self.path {
            f.write_str(path)?;
        }
        Ok(())
    }
}

/// A live endpoint implementation.
pub trait Transport: Send {
    /// Component name used when registering with the dispatcher.
    fn name(&self) -> String;

    /// Install handlers on `channel` and start I/O as component `id`.
    fn attach(
        self: Box<Self>,
        id: ComponentId,
        channel: &str,
        dispatcher: &mut Dispatcher,
    ) -> Result<(), TransportError>;
}

/// Builds transports for a bridge role.
pub trait TransportFactory: Send + Sync {
    fn create(&self, role: Role, context: &ConnectionContext) -> ResolveResult<Box<dyn Transport>>;
}

impl<T: TransportFactory + ?Sized> TransportFactory for Arc<T> {
    fn create(&self, role: Role, context: &ConnectionContext) -> ResolveResult<Box<dyn Transport>> {
        (**self).create(role, context)
    }
}

/// Factory for the built-in `tcp` and `memory` schemes.
#[derive(Debug, Clone, Default)]
pub struct DefaultTransportFactory {
    hub: MemoryHub,
    retry: ClientRetry,
}

impl DefaultTransportFactory {
    pub fn new(retry: ClientRetry) -> Self {
        Self {
            hub: MemoryHub::default(),
            retry,
        }
    }

    /// Schemes `create` can build.
    pub const SCHEMES: &'static [&'static str] = &["tcp", "memory"];

    pub fn supports(scheme: &str) -> bool {
        Self::SCHEMES.contains(&scheme)
    }

    /// Links of every memory endpoint this factory has built.
    pub fn memory_hub(&self) -> &MemoryHub {
        &self.hub
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn create(&self, role: Role, context: &ConnectionContext) -> ResolveResult<Box<dyn Transport>> {
        match context.scheme.as_str() {
            "tcp" => {
                let port = context.port.ok_or_else(|| ResolveError::Malformed {
                    interface: context.to_string(),
                    message: "missing port".to_string(),
                })?;
                match role {
                    Role::Server => {
                        let host = context.host.as_deref().unwrap_or("0.0.0.0");
                        Ok(Box::new(TcpServer::new(host, port)))
                    }
                    Role::Client => {
                        let host = context.host.as_deref().unwrap_or("127.0.0.1");
                        Ok(Box::new(TcpClient::new(host, port, self.retry.clone())))
                    }
                }
            }
            "memory" => {
                let name = context.host.clone().unwrap_or_default();
                Ok(Box::new(self.hub.transport(&name)))
            }
            other => Err(ResolveError::UnsupportedScheme {
                scheme: other.to_string(),
                role: role.to_string(),
            }),
        }
    }
}
