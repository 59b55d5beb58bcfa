//! Cooperative single-threaded event dispatcher.
//!
//! Components are registered with a name and a channel. Handlers subscribe to
//! one channel with a [`Matcher`]. Firing only enqueues; [`Dispatcher::flush`]
//! drains the queue in FIFO order, invoking matching handlers of each event's
//! channel in registration order. Anything a handler fires lands at the back of
//! the queue, so a forwarded event is never observed before every handler of
//! the event that caused it has run.

use std::collections::{HashMap, VecDeque};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use super::handler::Handler;
use super::types::{Event, EventBody, Fire, Matcher};
use crate::common::error::DispatchError;
use crate::common::types::{ComponentId, HandlerId};

/// Default bound on events processed by a single flush.
pub const DEFAULT_MAX_EVENTS_PER_FLUSH: usize = 100_000;

/// Tunables for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Stop a flush after this many events, leaving the rest queued.
    pub max_events_per_flush: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            max_events_per_flush: DEFAULT_MAX_EVENTS_PER_FLUSH,
        }
    }
}

/// A registered component.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub name: String,
    pub channel: String,
    /// The component this one was registered under, if any.
    pub manager: Option<ComponentId>,
}

pub(super) struct Registration {
    pub(super) id: HandlerId,
    pub(super) owner: ComponentId,
    pub(super) matcher: Matcher,
    handler: Box<dyn Handler>,
}

/// The event bus.
pub struct Dispatcher {
    settings: DispatcherSettings,
    pub(super) components: HashMap<ComponentId, ComponentInfo>,
    /// Component ids in registration order.
    pub(super) order: Vec<ComponentId>,
    pub(super) channels: HashMap<String, Vec<Registration>>,
    queue: VecDeque<Fire>,
    injector: mpsc::UnboundedSender<Fire>,
    inbound: Option<mpsc::UnboundedReceiver<Fire>>,
}

impl Dispatcher {
    pub fn new(settings: DispatcherSettings) -> Self {
        let (injector, inbound) = mpsc::unbounded_channel();
        Self {
            settings,
            components: HashMap::new(),
            order: Vec::new(),
            channels: HashMap::new(),
            queue: VecDeque::new(),
            injector,
            inbound: Some(inbound),
        }
    }

    /// Register a component on `channel`, optionally under a managing component.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        channel: impl Into<String>,
        manager: Option<ComponentId>,
    ) -> ComponentId {
        let id = ComponentId::next();
        let info = ComponentInfo {
            name: name.into(),
            channel: channel.into(),
            manager,
        };
        debug!(component = %id, name = %info.name, channel = %info.channel, "Registered component");
        self.components.insert(id, info);
        self.order.push(id);
        id
    }

    /// Remove a component, everything registered under it and all their handlers.
    ///
    /// Returns false if the component was not registered.
    pub fn unregister(&mut self, id: ComponentId) -> bool {
        if !self.components.contains_key(&id) {
            return false;
        }

        for child in self.children(id) {
            self.unregister(child);
        }

        self.remove_handlers_where(|reg| reg.owner == id);
        self.components.remove(&id);
        self.order.retain(|c| *c != id);
        debug!(component = %id, "Unregistered component");
        true
    }

    pub fn component(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.components.get(&id)
    }

    pub fn is_registered(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id)
    }

    /// Direct children of a component, in registration order.
    pub fn children(&self, id: ComponentId) -> Vec<ComponentId> {
        self.order
            .iter()
            .copied()
            .filter(|c| {
                self.components
                    .get(c)
                    .is_some_and(|info| info.manager == Some(id))
            })
            .collect()
    }

    /// Move a component under another manager, or detach it with `None`.
    ///
    /// Returns false if the component is not registered.
    pub fn set_manager(&mut self, id: ComponentId, manager: Option<ComponentId>) -> bool {
        match self.components.get_mut(&id) {
            Some(info) => {
                info.manager = manager;
                true
            }
            None => false,
        }
    }

    /// Attach a handler owned by `owner` to `channel`.
    pub fn add_handler(
        &mut self,
        owner: ComponentId,
        channel: impl Into<String>,
        matcher: Matcher,
        handler: impl Handler + 'static,
    ) -> HandlerId {
        let id = HandlerId::next();
        let channel = channel.into();
        trace!(handler = %id, owner = %owner, channel = %channel, "Adding handler");
        self.channels.entry(channel).or_default().push(Registration {
            id,
            owner,
            matcher,
            handler: Box::new(handler),
        });
        id
    }

    /// Detach a handler. Returns false if it was not attached.
    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        self.remove_handlers_where(|reg| reg.id == id) > 0
    }

    fn remove_handlers_where(&mut self, mut pred: impl FnMut(&Registration) -> bool) -> usize {
        let mut removed = 0;
        for registrations in self.channels.values_mut() {
            let before = registrations.len();
            registrations.retain(|reg| !pred(reg));
            removed += before - registrations.len();
        }
        self.channels.retain(|_, registrations| !registrations.is_empty());
        removed
    }

    /// Number of handlers attached to a channel.
    pub fn handler_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(Vec::len).unwrap_or(0)
    }

    /// Enqueue an event on `channel` with `origin` as its sender.
    pub fn fire(&mut self, origin: ComponentId, body: EventBody, channel: impl Into<String>) {
        self.queue.push_back(Fire::new(origin, channel, body));
    }

    /// Number of events waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Sender for feeding events in from other tasks.
    pub fn injector(&self) -> mpsc::UnboundedSender<Fire> {
        self.injector.clone()
    }

    /// Dispatch queued events until the queue is empty or the flush bound is hit.
    ///
    /// Returns how many events were dispatched.
    pub fn flush(&mut self) -> usize {
        let mut dispatched = 0;

        while let Some(fire) = self.queue.pop_front() {
            if dispatched >= self.settings.max_events_per_flush {
                self.queue.push_front(fire);
                warn!(
                    limit = self.settings.max_events_per_flush,
                    remaining = self.queue.len(),
                    "Flush bound reached, deferring remaining events"
                );
                break;
            }
            dispatched += 1;

            let Fire {
                origin,
                channel,
                body,
            } = fire;
            let event = Event::new(body, origin);

            let Some(registrations) = self.channels.get_mut(&channel) else {
                trace!(channel = %channel, event = %event, "No handlers on channel");
                continue;
            };

            let mut produced = Vec::new();
            for reg in registrations.iter_mut() {
                if !reg.matcher.matches(event.name()) {
                    continue;
                }
                if let Some(next) = reg.handler.handle(&event) {
                    produced.push(next);
                }
            }
            self.queue.extend(produced);
        }

        dispatched
    }

    /// Pump injected events until the shutdown flag flips to true.
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), DispatchError> {
        let mut inbound = self.inbound.take().ok_or(DispatchError::AlreadyRunning)?;
        info!("Dispatcher running");

        self.flush();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                fire = inbound.recv() => {
                    let Some(fire) = fire else { break };
                    self.queue.push_back(fire);
                    while let Ok(fire) = inbound.try_recv() {
                        self.queue.push_back(fire);
                    }
                    self.flush();
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.inbound = Some(inbound);
        info!("Dispatcher stopped");
        Ok(())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::event::kind::EventKind;
    use crate::event::types::Arg;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn recorder(seen: &Seen, tag: &'static str) -> impl Handler + 'static {
        let seen = Arc::clone(seen);
        move |event: &Event| -> Option<Fire> {
            seen.lock().unwrap().push(format!("{}:{}", tag, event.name()));
            None
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let mut dispatcher = Dispatcher::default();
        let owner = dispatcher.register("owner", "main", None);
        let seen: Seen = Arc::default();

        dispatcher.add_handler(owner, "main", Matcher::All, recorder(&seen, "a"));
        dispatcher.add_handler(owner, "main", Matcher::All, recorder(&seen, "b"));
        dispatcher.fire(owner, EventBody::new("ping", vec![]), "main");

        assert_eq!(dispatcher.flush(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["a:ping", "b:ping"]);
    }

    #[test]
    fn test_matcher_scopes_delivery() {
        let mut dispatcher = Dispatcher::default();
        let owner = dispatcher.register("owner", "main", None);
        let seen: Seen = Arc::default();

        dispatcher.add_handler(owner, "main", Matcher::socket_events(), recorder(&seen, "s"));
        dispatcher.fire(owner, EventBody::new("started", vec![]), "main");
        dispatcher.fire(owner, EventBody::of(EventKind::Read, vec![]), "main");
        dispatcher.fire(owner, EventBody::of(EventKind::Read, vec![]), "other");
        dispatcher.flush();

        assert_eq!(*seen.lock().unwrap(), vec!["s:read"]);
    }

    #[test]
    fn test_fired_events_queue_behind_current_event() {
        let mut dispatcher = Dispatcher::default();
        let owner = dispatcher.register("owner", "main", None);
        let seen: Seen = Arc::default();

        dispatcher.add_handler(owner, "main", Matcher::Names(vec!["first".into()]), move |event: &Event| -> Option<Fire> {
            Some(Fire::new(event.origin(), "main", EventBody::new("second", vec![])))
        });
        dispatcher.add_handler(owner, "main", Matcher::All, recorder(&seen, "r"));
        dispatcher.fire(owner, EventBody::new("first", vec![]), "main");

        assert_eq!(dispatcher.flush(), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["r:first", "r:second"]);
    }

    #[test]
    fn test_origin_is_stamped() {
        let mut dispatcher = Dispatcher::default();
        let owner = dispatcher.register("owner", "main", None);
        let sender = ComponentId::next();
        let origins: Arc<Mutex<Vec<ComponentId>>> = Arc::default();
        let sink = Arc::clone(&origins);

        dispatcher.add_handler(owner, "main", Matcher::All, move |event: &Event| -> Option<Fire> {
            sink.lock().unwrap().push(event.origin());
            None
        });
        dispatcher.fire(sender, EventBody::new("x", vec![Arg::Int(1)]), "main");
        dispatcher.flush();

        assert_eq!(*origins.lock().unwrap(), vec![sender]);
    }

    #[test]
    fn test_flush_bound_defers_runaway_loops() {
        let mut dispatcher = Dispatcher::new(DispatcherSettings {
            max_events_per_flush: 10,
        });
        let owner = dispatcher.register("looper", "main", None);
        dispatcher.add_handler(owner, "main", Matcher::All, move |event: &Event| -> Option<Fire> {
            Some(Fire::new(event.origin(), "main", event.reconstruct()))
        });
        dispatcher.fire(owner, EventBody::new("spin", vec![]), "main");

        assert_eq!(dispatcher.flush(), 10);
        assert_eq!(dispatcher.pending(), 1);
    }

    #[test]
    fn test_unregister_is_recursive_and_drops_handlers() {
        let mut dispatcher = Dispatcher::default();
        let parent = dispatcher.register("parent", "main", None);
        let child = dispatcher.register("child", "main_1", Some(parent));
        let grandchild = dispatcher.register("grandchild", "main_2", Some(child));
        let seen: Seen = Arc::default();

        dispatcher.add_handler(child, "main_1", Matcher::All, recorder(&seen, "c"));
        dispatcher.add_handler(grandchild, "main", Matcher::All, recorder(&seen, "g"));

        assert!(dispatcher.unregister(child));
        assert!(!dispatcher.is_registered(grandchild));
        assert!(dispatcher.is_registered(parent));
        assert_eq!(dispatcher.handler_count("main"), 0);
        assert_eq!(dispatcher.handler_count("main_1"), 0);
        assert!(!dispatcher.unregister(child));
    }

    #[test]
    fn test_set_manager_reparents() {
        let mut dispatcher = Dispatcher::default();
        let first = dispatcher.register("first", "main", None);
        let second = dispatcher.register("second", "main", None);
        let child = dispatcher.register("child", "side", Some(first));

        assert!(dispatcher.set_manager(child, Some(second)));
        assert!(dispatcher.children(first).is_empty());
        assert_eq!(dispatcher.children(second), vec![child]);

        assert!(dispatcher.set_manager(child, None));
        dispatcher.unregister(second);
        assert!(dispatcher.is_registered(child));
        assert!(!dispatcher.set_manager(ComponentId::next(), None));
    }

    #[test]
    fn test_remove_handler() {
        let mut dispatcher = Dispatcher::default();
        let owner = dispatcher.register("owner", "main", None);
        let seen: Seen = Arc::default();

        let id = dispatcher.add_handler(owner, "main", Matcher::All, recorder(&seen, "x"));
        assert!(dispatcher.remove_handler(id));
        assert!(!dispatcher.remove_handler(id));

        dispatcher.fire(owner, EventBody::new("ping", vec![]), "main");
        dispatcher.flush();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_pumps_injected_events_until_shutdown() {
        let mut dispatcher = Dispatcher::default();
        let owner = dispatcher.register("owner", "main", None);
        let seen: Seen = Arc::default();
        dispatcher.add_handler(owner, "main", Matcher::All, recorder(&seen, "r"));

        let injector = dispatcher.injector();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let result = dispatcher.run(shutdown_rx).await;
            (dispatcher, result)
        });

        injector
            .send(Fire::new(owner, "main", EventBody::new("tick", vec![])))
            .unwrap();

        for _ in 0..100 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        shutdown_tx.send(true).unwrap();

        let (mut dispatcher, result) = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(*seen.lock().unwrap(), vec!["r:tick"]);

        // The receiver is handed back, so the loop can be resumed.
        let (_tx, rx) = watch::channel(true);
        assert!(dispatcher.run(rx).await.is_ok());
    }
}
