//! In-process endpoint.
//!
//! Records every socket event delivered to its channel by someone other than
//! itself. Useful for dry runs and for observing what a bridge pushes down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::Transport;
use crate::common::error::TransportError;
use crate::common::types::ComponentId;
use crate::event::{Dispatcher, Event, Fire, Matcher};

/// Shared view of the events delivered to a memory endpoint.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    delivered: Arc<Mutex<Vec<Event>>>,
}

impl MemoryLink {
    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: Event) {
        self.lock().push(event);
    }

    /// Snapshot of everything delivered so far.
    pub fn delivered(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Remove and return everything delivered so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.lock())
    }
}

/// Memory endpoint.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    name: String,
    link: MemoryLink,
}

impl MemoryTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: MemoryLink::default(),
        }
    }

    pub fn link(&self) -> MemoryLink {
        self.link.clone()
    }
}

impl Transport for MemoryTransport {
    fn name(&self) -> String {
        format!("Memory({})", self.name)
    }

    fn attach(
        self: Box<Self>,
        id: ComponentId,
        channel: &str,
        dispatcher: &mut Dispatcher,
    ) -> Result<(), TransportError> {
        let link = self.link;
        dispatcher.add_handler(id, channel, Matcher::socket_events(), move |event: &Event| -> Option<Fire> {
            if event.origin() != id {
                trace!(endpoint = %id, event = %event, "Memory endpoint received event");
                link.push(event.clone());
            }
            None
        });
        Ok(())
    }
}

/// Named memory endpoints built by one factory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    links: Arc<Mutex<HashMap<String, MemoryLink>>>,
}

impl MemoryHub {
    /// Build a transport for `name`, sharing the link of any earlier one.
    pub fn transport(&self, name: &str) -> MemoryTransport {
        let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
        let link = links.entry(name.to_string()).or_default().clone();
        MemoryTransport {
            name: name.to_string(),
            link,
        }
    }

    pub fn link(&self, name: &str) -> Option<MemoryLink> {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}
