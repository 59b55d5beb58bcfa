//! The bridge: one public channel in front of many bound endpoints.
//!
//! Binding resolves a descriptor, registers the endpoint under the bridge,
//! lets its transport attach, records it in the binding registry and installs
//! the relay rules. All of that happens under one `&mut Dispatcher`, so no
//! event is dispatched against a half-bound endpoint.

use std::collections::HashMap;

use tracing::{debug, info};

use super::registry::BindingRegistry;
use super::relay::{self, RulePair};
use super::resolver::{resolve, Descriptor, Resolve, Resolved};
use crate::common::error::{BindError, BindResult};
use crate::common::types::ComponentId;
use crate::event::{Dispatcher, EventBody};

/// One bound endpoint.
#[derive(Debug, Clone)]
struct Binding {
    channel: String,
    rules: RulePair,
    /// Whether the bridge built the endpoint (and so unregisters it on unbind).
    constructed: bool,
}

/// The relay owner.
pub struct Bridge {
    id: ComponentId,
    channel: String,
    resolver: Box<dyn Resolve>,
    registry: BindingRegistry,
    bindings: HashMap<ComponentId, Binding>,
    /// Tokens handed out for endpoint channel names.
    next_token: u64,
}

impl Bridge {
    /// Create a bridge on `channel` and register it with the dispatcher.
    pub fn new(
        dispatcher: &mut Dispatcher,
        channel: impl Into<String>,
        resolver: impl Resolve + 'static,
    ) -> Self {
        let channel = channel.into();
        let name = match resolver.role() {
            Some(role) => format!("Bridge({})", role),
            None => "Bridge".to_string(),
        };
        let id = dispatcher.register(name, channel.clone(), None);
        info!(bridge = %id, channel = %channel, "Bridge created");

        Self {
            id,
            channel,
            resolver: Box::new(resolver),
            registry: BindingRegistry::new(),
            bindings: HashMap::new(),
            next_token: 1,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The public channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Bound endpoints and their private channels, ordered by identity.
    pub fn endpoints(&self) -> Vec<(ComponentId, String)> {
        let mut endpoints: Vec<_> = self
            .bindings
            .iter()
            .map(|(id, binding)| (*id, binding.channel.clone()))
            .collect();
        endpoints.sort_by_key(|(id, _)| *id);
        endpoints
    }

    pub fn channel_of(&self, endpoint: ComponentId) -> Option<&str> {
        self.bindings.get(&endpoint).map(|b| b.channel.as_str())
    }

    /// Bind an endpoint and return its identity.
    ///
    /// Nothing is registered unless resolution and attachment both succeed.
    pub fn bind(
        &mut self,
        dispatcher: &mut Dispatcher,
        descriptor: impl Into<Descriptor>,
    ) -> BindResult<ComponentId> {
        let token = self.next_token;
        let resolved = resolve(self.resolver.as_ref(), descriptor.into(), &self.channel, token)?;

        let (id, channel, constructed) = match resolved {
            Resolved::Live(id) => {
                let channel = self.live_channel(dispatcher, id)?;
                dispatcher.set_manager(id, Some(self.id));
                debug!(bridge = %self.id, endpoint = %id, channel = %channel, "Binding live component");
                (id, channel, false)
            }
            Resolved::Constructed {
                channel,
                transport,
                interface,
            } => {
                self.next_token += 1;
                let id = dispatcher.register(transport.name(), channel.clone(), Some(self.id));
                if let Err(e) = transport.attach(id, &channel, dispatcher) {
                    dispatcher.unregister(id);
                    return Err(e.into());
                }
                debug!(bridge = %self.id, endpoint = %id, channel = %channel, interface = %interface, "Binding interface");
                (id, channel, true)
            }
        };

        self.registry.add(id);
        let rules = relay::install(dispatcher, self.id, &self.channel, id, &channel, &self.registry);
        self.bindings.insert(
            id,
            Binding {
                channel,
                rules,
                constructed,
            },
        );

        info!(bridge = %self.id, endpoint = %id, bound = self.bindings.len(), "Endpoint bound");
        Ok(id)
    }

    /// Remove an endpoint's registry entry and both relay rules.
    ///
    /// Endpoints the bridge constructed are unregistered; live components are
    /// detached from the bridge but left registered.
    pub fn unbind(&mut self, dispatcher: &mut Dispatcher, endpoint: ComponentId) -> BindResult<()> {
        let binding = self
            .bindings
            .remove(&endpoint)
            .ok_or(BindError::NotBound(endpoint))?;
        self.release(dispatcher, endpoint, binding);
        Ok(())
    }

    /// Channel of a live component, checked for use as an endpoint.
    fn live_channel(&self, dispatcher: &Dispatcher, id: ComponentId) -> BindResult<String> {
        if self.registry.contains(id) {
            return Err(BindError::AlreadyBound(id));
        }
        if id == self.id {
            return Err(BindError::InvalidEndpoint {
                id,
                reason: "a bridge cannot bind itself",
            });
        }
        let info = dispatcher
            .component(id)
            .ok_or(BindError::NotRegistered(id))?;
        if info.channel == self.channel {
            return Err(BindError::InvalidEndpoint {
                id,
                reason: "endpoint is on the bridge's public channel",
            });
        }
        Ok(info.channel.clone())
    }

    fn release(&self, dispatcher: &mut Dispatcher, endpoint: ComponentId, binding: Binding) {
        self.registry.remove(endpoint);
        relay::uninstall(dispatcher, binding.rules);
        if binding.constructed {
            dispatcher.unregister(endpoint);
        } else {
            dispatcher.set_manager(endpoint, None);
        }
        info!(bridge = %self.id, endpoint = %endpoint, bound = self.registry.len(), "Endpoint unbound");
    }

    /// Fire an event on the public channel as the bridge.
    ///
    /// The downward rules push it to every bound endpoint.
    pub fn fire(&self, dispatcher: &mut Dispatcher, body: EventBody) {
        dispatcher.fire(self.id, body, self.channel.clone());
    }

    /// Unbind everything and unregister the bridge.
    pub fn teardown(mut self, dispatcher: &mut Dispatcher) {
        for (endpoint, binding) in std::mem::take(&mut self.bindings) {
            self.release(dispatcher, endpoint, binding);
        }
        dispatcher.unregister(self.id);
        info!(bridge = %self.id, "Bridge torn down");
    }
}
