//! Handler trait for channel subscriptions.

use super::types::{Event, Fire};

/// A standing subscription on one channel.
///
/// A handler observes each matching event and may ask the dispatcher to fire
/// one new event in response. The new event is queued, never delivered
/// re-entrantly.
pub trait Handler: Send {
    fn handle(&mut self, event: &Event) -> Option<Fire>;
}

impl<F> Handler for F
where
    F: FnMut(&Event) -> Option<Fire> + Send,
{
    fn handle(&mut self, event: &Event) -> Option<Fire> {
        self(event)
    }
}
