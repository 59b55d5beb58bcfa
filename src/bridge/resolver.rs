//! Turning bind descriptors into endpoints.
//!
//! A descriptor is either a component that already lives on the dispatcher,
//! used as-is on the channel it was registered with, or an opaque interface
//! string. Interfaces go
//! through the resolver's `parse_interface`, get a private channel derived from
//! the bridge channel, and are built into a transport for the bridge's role.

use std::sync::Arc;

use crate::common::error::{ResolveError, ResolveResult};
use crate::common::types::ComponentId;
use crate::transport::{ConnectionContext, Role, Transport, TransportFactory};

/// What `Bridge::bind` accepts.
pub enum Descriptor {
    /// A component already registered with the dispatcher.
    Live(ComponentId),
    /// An address such as `tcp://127.0.0.1:8000`.
    Interface(String),
}

impl Descriptor {
    pub fn live(id: ComponentId) -> Self {
        Descriptor::Live(id)
    }
}

impl From<&str> for Descriptor {
    fn from(interface: &str) -> Self {
        Descriptor::Interface(interface.to_string())
    }
}

impl From<String> for Descriptor {
    fn from(interface: String) -> Self {
        Descriptor::Interface(interface)
    }
}

/// Result of resolving a descriptor.
///
/// A live component's channel is looked up by the bridge from the dispatcher.
pub enum Resolved {
    Live(ComponentId),
    Constructed {
        channel: String,
        transport: Box<dyn Transport>,
        /// Normalized interface string.
        interface: String,
    },
}

/// Signature of pluggable interface parsers.
pub type ParseFn = fn(&str) -> ResolveResult<(ConnectionContext, String)>;

/// Resolution strategy of a bridge.
///
/// Both methods default to `NotImplemented`; a bridge built on the bare trait
/// can still bind live components but rejects every interface.
pub trait Resolve: Send + Sync {
    /// Role of the endpoints this resolver builds, if any.
    fn role(&self) -> Option<Role> {
        None
    }

    /// Map an interface to construction parameters and its normalized form.
    fn parse_interface(&self, interface: &str) -> ResolveResult<(ConnectionContext, String)> {
        Err(ResolveError::NotImplemented {
            interface: interface.to_string(),
        })
    }

    /// Build a transport from parsed parameters.
    fn construct(&self, context: &ConnectionContext) -> ResolveResult<Box<dyn Transport>> {
        Err(ResolveError::NotImplemented {
            interface: context.to_string(),
        })
    }
}

/// Resolver without any strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbstractResolver;

impl Resolve for AbstractResolver {}

/// Resolver for a server or client bridge.
pub struct RoleResolver {
    role: Role,
    parse: ParseFn,
    factory: Arc<dyn TransportFactory>,
}

impl RoleResolver {
    pub fn new(role: Role, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            role,
            parse: parse_interface,
            factory,
        }
    }

    pub fn server(factory: Arc<dyn TransportFactory>) -> Self {
        Self::new(Role::Server, factory)
    }

    pub fn client(factory: Arc<dyn TransportFactory>) -> Self {
        Self::new(Role::Client, factory)
    }

    /// Replace the interface parser.
    pub fn with_parser(mut self, parse: ParseFn) -> Self {
        self.parse = parse;
        self
    }
}

impl Resolve for RoleResolver {
    fn role(&self) -> Option<Role> {
        Some(self.role)
    }

    fn parse_interface(&self, interface: &str) -> ResolveResult<(ConnectionContext, String)> {
        (self.parse)(interface)
    }

    fn construct(&self, context: &ConnectionContext) -> ResolveResult<Box<dyn Transport>> {
        self.factory.create(self.role, context)
    }
}

/// Private channel name for the `token`-th endpoint of a bridge.
pub fn endpoint_channel(bridge_channel: &str, token: u64) -> String {
    format!("{}_{}", bridge_channel, token)
}

/// Resolve a descriptor. Has no side effects on the dispatcher.
pub fn resolve(
    resolver: &dyn Resolve,
    descriptor: Descriptor,
    bridge_channel: &str,
    token: u64,
) -> ResolveResult<Resolved> {
    match descriptor {
        Descriptor::Live(id) => Ok(Resolved::Live(id)),
        Descriptor::Interface(interface) => {
            let (context, interface) = resolver.parse_interface(&interface)?;
            let transport = resolver.construct(&context)?;
            Ok(Resolved::Constructed {
                channel: endpoint_channel(bridge_channel, token),
                transport,
                interface,
            })
        }
    }
}

/// Parser that passes the interface through untouched with an empty context.
pub fn identity_parse(interface: &str) -> ResolveResult<(ConnectionContext, String)> {
    Ok((ConnectionContext::default(), interface.to_string()))
}

/// Parse `tcp://host:port`, `host:port`, `:port`, `port`, `unix:///path` or
/// `memory://name`.
pub fn parse_interface(interface: &str) -> ResolveResult<(ConnectionContext, String)> {
    let malformed = |message: String| ResolveError::Malformed {
        interface: interface.to_string(),
        message,
    };

    let trimmed = interface.trim();
    if trimmed.is_empty() {
        return Err(malformed("empty interface".to_string()));
    }

    let (scheme, rest) = match trimmed.split_once("://") {
        Some((scheme, rest)) => (scheme.to_lowercase(), rest),
        None => ("tcp".to_string(), trimmed),
    };

    let context = match scheme.as_str() {
        "tcp" => {
            let (host, port) = split_host_port(rest).map_err(malformed)?;
            ConnectionContext {
                scheme,
                host,
                port: Some(port),
                path: None,
            }
        }
        "unix" => {
            if rest.is_empty() {
                return Err(malformed("missing socket path".to_string()));
            }
            ConnectionContext {
                scheme,
                host: None,
                port: None,
                path: Some(rest.to_string()),
            }
        }
        "memory" => {
            if rest.is_empty() {
                return Err(malformed("missing endpoint name".to_string()));
            }
            ConnectionContext {
                scheme,
                host: Some(rest.to_string()),
                port: None,
                path: None,
            }
        }
        other => return Err(malformed(format!("unknown scheme '{}'", other))),
    };

    let normalized = context.to_string();
    Ok((context, normalized))
}

fn split_host_port(rest: &str) -> Result<(Option<String>, u16), String> {
    let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| "unterminated IPv6 address".to_string())?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| "missing port".to_string())?;
        (Some(format!("[{}]", host)), port)
    } else {
        match rest.split_once(':') {
            Some((host, port)) => {
                if port.contains(':') {
                    return Err("IPv6 addresses must be bracketed".to_string());
                }
                let host = (!host.is_empty()).then(|| host.to_string());
                (host, port)
            }
            None => (None, rest),
        }
    };

    let port = port
        .parse::<u16>()
        .map_err(|_| format!("invalid port '{}'", port))?;
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DefaultTransportFactory;

    #[test]
    fn test_parse_tcp_forms() {
        let (ctx, normalized) = parse_interface("tcp://127.0.0.1:8000").unwrap();
        assert_eq!(ctx.scheme, "tcp");
        assert_eq!(ctx.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(ctx.port, Some(8000));
        assert_eq!(normalized, "tcp://127.0.0.1:8000");

        let (ctx, normalized) = parse_interface("localhost:80").unwrap();
        assert_eq!(ctx.host.as_deref(), Some("localhost"));
        assert_eq!(normalized, "tcp://localhost:80");

        let (ctx, _) = parse_interface(":9000").unwrap();
        assert_eq!(ctx.host, None);
        assert_eq!(ctx.port, Some(9000));

        let (ctx, _) = parse_interface("9000").unwrap();
        assert_eq!(ctx.port, Some(9000));

        let (ctx, normalized) = parse_interface("TCP://[::1]:443").unwrap();
        assert_eq!(ctx.host.as_deref(), Some("[::1]"));
        assert_eq!(normalized, "tcp://[::1]:443");
    }

    #[test]
    fn test_parse_other_schemes() {
        let (ctx, normalized) = parse_interface("unix:///tmp/app.sock").unwrap();
        assert_eq!(ctx.path.as_deref(), Some("/tmp/app.sock"));
        assert_eq!(normalized, "unix:///tmp/app.sock");

        let (ctx, normalized) = parse_interface("memory://alpha").unwrap();
        assert_eq!(ctx.host.as_deref(), Some("alpha"));
        assert_eq!(normalized, "memory://alpha");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "   ", "tcp://host", "host:http", "host:70000", "ftp://x:1", "::1:80", "[::1", "unix://", "memory://"] {
            let result = parse_interface(bad);
            assert!(
                matches!(result, Err(ResolveError::Malformed { .. })),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_identity_parse() {
        let (ctx, normalized) = identity_parse("anything at all").unwrap();
        assert_eq!(ctx, ConnectionContext::default());
        assert_eq!(normalized, "anything at all");
    }

    #[test]
    fn test_abstract_resolver_is_not_implemented() {
        let result = resolve(&AbstractResolver, Descriptor::from("tcp://127.0.0.1:1"), "web", 1);
        assert!(matches!(result, Err(ResolveError::NotImplemented { .. })));
    }

    #[test]
    fn test_live_descriptor_passes_through() {
        let id = ComponentId::next();
        let resolved = resolve(&AbstractResolver, Descriptor::live(id), "web", 1).unwrap();
        match resolved {
            Resolved::Live(got) => assert_eq!(got, id),
            Resolved::Constructed { .. } => panic!("live descriptor was rebuilt"),
        }
    }

    #[test]
    fn test_interface_gets_derived_channel() {
        let resolver = RoleResolver::server(Arc::new(DefaultTransportFactory::default()));
        let resolved = resolve(&resolver, Descriptor::from("memory://a"), "web", 3).unwrap();
        match resolved {
            Resolved::Constructed {
                channel,
                transport,
                interface,
            } => {
                assert_eq!(channel, "web_3");
                assert_eq!(transport.name(), "Memory(a)");
                assert_eq!(interface, "memory://a");
            }
            Resolved::Live(_) => panic!("interface resolved as live"),
        }
    }

    #[test]
    fn test_identity_parser_leaves_factory_to_reject() {
        let resolver = RoleResolver::client(Arc::new(DefaultTransportFactory::default()))
            .with_parser(identity_parse);
        let result = resolve(&resolver, Descriptor::from("tcp://127.0.0.1:1"), "web", 1);
        assert!(matches!(result, Err(ResolveError::UnsupportedScheme { .. })));
    }
}
