//! Shared identity types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_COMPONENT: AtomicU64 = AtomicU64::new(1);
static NEXT_HANDLER: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a component registered with a dispatcher.
///
/// Identities are compared by value but are never derived from a component's
/// contents, so two structurally equal components still differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Allocate a fresh identity. Identities are never reused within a process.
    pub fn next() -> Self {
        Self(NEXT_COMPONENT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one handler registration on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub fn next() -> Self {
        Self(NEXT_HANDLER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}
