//! Application services that sit on a bridge's public channel.
//!
//! They only ever see the public channel, so they cannot tell which transport
//! an event came from beyond its origin identity.
//!
//! ## Module Structure
//!
//! - `Echo`: answers every relayed `read` with a bridge-originated `write`
//! - `Tap`: logs the traffic crossing the public channel

use tracing::{debug, info};

use crate::bridge::{BindingRegistry, Bridge};
use crate::common::types::{ComponentId, HandlerId};
use crate::config::ServiceConfig;
use crate::event::{Dispatcher, Event, EventBody, EventKind, Fire, Handler, Matcher};

/// Echo service.
///
/// Replays the arguments of a `read(conn, data)` as `write(conn, data)`. The
/// downward rules take the write to every endpoint; only the endpoint owning
/// `conn` acts on it.
#[derive(Debug, Clone)]
pub struct Echo {
    bridge: ComponentId,
    channel: String,
    registry: BindingRegistry,
}

impl Echo {
    pub fn new(bridge: &Bridge) -> Self {
        Self {
            bridge: bridge.id(),
            channel: bridge.channel().to_string(),
            registry: bridge.registry().clone(),
        }
    }
}

impl Handler for Echo {
    fn handle(&mut self, event: &Event) -> Option<Fire> {
        // Reads fired straight onto the public channel by anyone else are ignored.
        if !self.registry.contains(event.origin()) {
            return None;
        }
        debug!(endpoint = %event.origin(), "Echoing read");
        Some(Fire::new(
            self.bridge,
            self.channel.clone(),
            EventBody::of(EventKind::Write, event.args().to_vec()),
        ))
    }
}

/// Traffic logger.
#[derive(Debug, Clone, Default)]
pub struct Tap;

impl Handler for Tap {
    fn handle(&mut self, event: &Event) -> Option<Fire> {
        match event.kind() {
            Some(EventKind::Read) | Some(EventKind::Write) => {
                debug!(origin = %event.origin(), event = %event, "Traffic")
            }
            Some(kind) => info!(origin = %event.origin(), event = %kind, args = event.args().len(), "Socket event"),
            None => debug!(origin = %event.origin(), event = %event, "Application event"),
        }
        None
    }
}

/// Install the configured services on a bridge's public channel.
///
/// Handlers are owned by the bridge, so they go away with it.
pub fn install(dispatcher: &mut Dispatcher, bridge: &Bridge, config: &ServiceConfig) -> Vec<HandlerId> {
    let mut installed = Vec::new();

    if config.tap {
        installed.push(dispatcher.add_handler(bridge.id(), bridge.channel(), Matcher::All, Tap));
    }
    if config.echo {
        installed.push(dispatcher.add_handler(
            bridge.id(),
            bridge.channel(),
            Matcher::Kinds(vec![EventKind::Read]),
            Echo::new(bridge),
        ));
    }

    info!(bridge = %bridge.id(), echo = config.echo, tap = config.tap, "Services installed");
    installed
}
