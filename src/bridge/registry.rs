//! Membership set of the endpoints bound to one bridge.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::common::types::ComponentId;

/// The set of endpoint identities bound to a bridge.
///
/// Cloning shares the set: the bridge mutates it while the downward relay
/// rules only query it. Every bridge owns its own registry.
#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    members: Arc<RwLock<HashSet<ComponentId>>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the endpoint was already present.
    pub fn add(&self, id: ComponentId) -> bool {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    /// Returns false if the endpoint was not present.
    pub fn remove(&self, id: ComponentId) -> bool {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Point-in-time copy of the members.
    pub fn all(&self) -> HashSet<ComponentId> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.members.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership() {
        let registry = BindingRegistry::new();
        let a = ComponentId::next();
        let b = ComponentId::next();

        assert!(registry.add(a));
        assert!(!registry.add(a));
        assert!(registry.contains(a));
        assert!(!registry.contains(b));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = BindingRegistry::new();
        let a = ComponentId::next();
        registry.add(a);

        let snapshot = registry.all();
        registry.add(ComponentId::next());

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&a));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clones_share_independent_registries_do_not() {
        let registry = BindingRegistry::new();
        let shared = registry.clone();
        let other = BindingRegistry::new();
        let a = ComponentId::next();

        registry.add(a);
        assert!(shared.contains(a));
        assert!(!other.contains(a));
    }
}
