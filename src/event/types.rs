//! Event values and payload arguments.

use std::fmt;

use bytes::Bytes;

use super::kind::EventKind;
use crate::common::types::ComponentId;

/// A single positional event argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Int(i64),
    Text(String),
    Bytes(Bytes),
    Bool(bool),
}

impl Arg {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Arg::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Arg::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Int(v) => write!(f, "{}", v),
            Arg::Text(v) => write!(f, "{:?}", v),
            Arg::Bytes(v) => write!(f, "{:?}", v),
            Arg::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<u64> for Arg {
    fn from(v: u64) -> Self {
        Arg::Int(v as i64)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Text(v)
    }
}

impl From<Bytes> for Arg {
    fn from(v: Bytes) -> Self {
        Arg::Bytes(v)
    }
}

impl From<&'static [u8]> for Arg {
    fn from(v: &'static [u8]) -> Self {
        Arg::Bytes(Bytes::from_static(v))
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

/// The kind and payload of an event, without an origin.
///
/// This is what gets handed to the dispatcher when firing; the dispatcher
/// stamps the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBody {
    pub name: String,
    pub args: Vec<Arg>,
}

impl EventBody {
    pub fn new(name: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Build a body for one of the socket event kinds.
    pub fn of(kind: EventKind, args: Vec<Arg>) -> Self {
        Self::new(kind.as_str(), args)
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_name(&self.name)
    }
}

impl fmt::Display for EventBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

/// An event as observed by handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    body: EventBody,
    origin: ComponentId,
}

impl Event {
    pub(crate) fn new(body: EventBody, origin: ComponentId) -> Self {
        Self { body, origin }
    }

    pub fn name(&self) -> &str {
        &self.body.name
    }

    pub fn args(&self) -> &[Arg] {
        &self.body.args
    }

    pub fn arg(&self, index: usize) -> Option<&Arg> {
        self.body.args.get(index)
    }

    pub fn kind(&self) -> Option<EventKind> {
        self.body.kind()
    }

    /// The component that fired this event.
    pub fn origin(&self) -> ComponentId {
        self.origin
    }

    pub fn body(&self) -> &EventBody {
        &self.body
    }

    /// A fresh body with the same kind and payload, for re-firing elsewhere.
    pub fn reconstruct(&self) -> EventBody {
        self.body.clone()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.body, self.origin)
    }
}

/// A request to fire a new event, returned by handlers and sent by transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fire {
    pub origin: ComponentId,
    pub channel: String,
    pub body: EventBody,
}

impl Fire {
    pub fn new(origin: ComponentId, channel: impl Into<String>, body: EventBody) -> Self {
        Self {
            origin,
            channel: channel.into(),
            body,
        }
    }
}

/// Which event names a handler registration accepts.
#[derive(Debug, Clone)]
pub enum Matcher {
    All,
    Kinds(Vec<EventKind>),
    Names(Vec<String>),
}

impl Matcher {
    /// Every socket event kind.
    pub fn socket_events() -> Self {
        Matcher::Kinds(EventKind::ALL.to_vec())
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Kinds(kinds) => {
                EventKind::from_name(name).is_some_and(|kind| kinds.contains(&kind))
            }
            Matcher::Names(names) => names.iter().any(|n| n == name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_is_independent_copy() {
        let origin = ComponentId::next();
        let event = Event::new(
            EventBody::of(EventKind::Write, vec![Arg::Bytes(Bytes::from_static(b"hi"))]),
            origin,
        );
        let mut body = event.reconstruct();
        body.args.push(Arg::Int(1));

        assert_eq!(event.args().len(), 1);
        assert_eq!(event.origin(), origin);
        assert_eq!(body.name, "write");
    }

    #[test]
    fn test_socket_matcher_ignores_other_names() {
        let matcher = Matcher::socket_events();
        assert!(matcher.matches("read"));
        assert!(matcher.matches("closed"));
        assert!(!matcher.matches("started"));
        assert!(!matcher.matches("request"));
    }

    #[test]
    fn test_named_matcher() {
        let matcher = Matcher::Names(vec!["tick".to_string()]);
        assert!(matcher.matches("tick"));
        assert!(!matcher.matches("read"));
        assert!(Matcher::All.matches("anything"));
    }

    #[test]
    fn test_body_display() {
        let body = EventBody::of(EventKind::Connected, vec![Arg::Int(7), Arg::from("peer")]);
        assert_eq!(body.to_string(), "connected(7, \"peer\")");
    }
}
