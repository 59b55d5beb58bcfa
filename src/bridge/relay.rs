//! Forwarding rules between a bridge's public channel and its endpoints.
//!
//! Each bound endpoint gets two rules over the socket event vocabulary:
//!
//! - **upward**, on the endpoint channel: re-fires events the endpoint itself
//!   fired onto the bridge channel, with the endpoint as origin.
//! - **downward**, on the bridge channel: re-fires events the bridge itself
//!   fired onto the endpoint channel, with the bridge as origin.
//!
//! The bridge channel also carries every upward relay, so the downward rule
//! first drops anything originating from a bound endpoint. Dropped events are
//! normal traffic and are only logged at trace level.

use tracing::trace;

use super::registry::BindingRegistry;
use crate::common::types::{ComponentId, HandlerId};
use crate::event::{Dispatcher, Event, Fire, Handler, Matcher};

/// Endpoint channel → bridge channel.
#[derive(Debug, Clone)]
pub struct UpwardRule {
    endpoint: ComponentId,
    bridge_channel: String,
}

impl UpwardRule {
    pub fn new(endpoint: ComponentId, bridge_channel: impl Into<String>) -> Self {
        Self {
            endpoint,
            bridge_channel: bridge_channel.into(),
        }
    }
}

impl Handler for UpwardRule {
    fn handle(&mut self, event: &Event) -> Option<Fire> {
        if event.origin() != self.endpoint {
            trace!(endpoint = %self.endpoint, event = %event, "Upward: not fired by endpoint");
            return None;
        }
        Some(Fire::new(
            self.endpoint,
            self.bridge_channel.clone(),
            event.reconstruct(),
        ))
    }
}

/// Bridge channel → endpoint channel.
#[derive(Debug, Clone)]
pub struct DownwardRule {
    bridge: ComponentId,
    endpoint: ComponentId,
    endpoint_channel: String,
    registry: BindingRegistry,
}

impl DownwardRule {
    pub fn new(
        bridge: ComponentId,
        endpoint: ComponentId,
        endpoint_channel: impl Into<String>,
        registry: BindingRegistry,
    ) -> Self {
        Self {
            bridge,
            endpoint,
            endpoint_channel: endpoint_channel.into(),
            registry,
        }
    }
}

impl Handler for DownwardRule {
    fn handle(&mut self, event: &Event) -> Option<Fire> {
        let origin = event.origin();
        if self.registry.contains(origin) {
            trace!(endpoint = %self.endpoint, event = %event, "Downward: relayed from a bound endpoint");
            return None;
        }
        if origin == self.endpoint {
            trace!(endpoint = %self.endpoint, event = %event, "Downward: fired by the endpoint itself");
            return None;
        }
        if origin != self.bridge {
            trace!(endpoint = %self.endpoint, event = %event, "Downward: not fired by the bridge");
            return None;
        }
        Some(Fire::new(
            self.bridge,
            self.endpoint_channel.clone(),
            event.reconstruct(),
        ))
    }
}

/// Handler ids of the two rules installed for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulePair {
    pub upward: HandlerId,
    pub downward: HandlerId,
}

/// Install both rules for an endpoint.
///
/// The upward rule is owned by the endpoint and the downward rule by the
/// bridge, so unregistering either component drops the rule living on its
/// own channel.
pub fn install(
    dispatcher: &mut Dispatcher,
    bridge: ComponentId,
    bridge_channel: &str,
    endpoint: ComponentId,
    endpoint_channel: &str,
    registry: &BindingRegistry,
) -> RulePair {
    let upward = dispatcher.add_handler(
        endpoint,
        endpoint_channel,
        Matcher::socket_events(),
        UpwardRule::new(endpoint, bridge_channel),
    );
    let downward = dispatcher.add_handler(
        bridge,
        bridge_channel,
        Matcher::socket_events(),
        DownwardRule::new(bridge, endpoint, endpoint_channel, registry.clone()),
    );
    RulePair { upward, downward }
}

/// Remove both rules. Rules already dropped with their owner are skipped.
pub fn uninstall(dispatcher: &mut Dispatcher, rules: RulePair) {
    dispatcher.remove_handler(rules.upward);
    dispatcher.remove_handler(rules.downward);
}
