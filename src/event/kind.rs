//! The socket event vocabulary.

use std::fmt;

/// Kinds of socket events that a bridge relays.
///
/// Any event whose name is not one of these is invisible to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    Connected,
    Disconnected,
    Read,
    Error,
    Write,
    Close,
    Ready,
    Closed,
}

impl EventKind {
    /// All variants, in the order the relay subscribes to them.
    pub const ALL: &'static [EventKind] = &[
        Self::Connect,
        Self::Disconnect,
        Self::Connected,
        Self::Disconnected,
        Self::Read,
        Self::Error,
        Self::Write,
        Self::Close,
        Self::Ready,
        Self::Closed,
    ];

    /// Look up a kind by its event name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "connect" => Some(Self::Connect),
            "disconnect" => Some(Self::Disconnect),
            "connected" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            "read" => Some(Self::Read),
            "error" => Some(Self::Error),
            "write" => Some(Self::Write),
            "close" => Some(Self::Close),
            "ready" => Some(Self::Ready),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Read => "read",
            Self::Error => "error",
            Self::Write => "write",
            Self::Close => "close",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
