//! Client-side handler registry.
//!
//! Tracks which handlers are interested in which server event and hands out
//! [`Subscription`] handles for precise removal.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::{ServerEvent, ServerEventKind};

/// Callback invoked for every received event of the subscribed kind.
pub type Handler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Handle identifying one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: ServerEventKind,
    id: u64,
}

impl Subscription {
    /// Event kind this subscription listens to.
    #[must_use]
    pub const fn kind(&self) -> ServerEventKind {
        self.kind
    }
}

/// Handlers keyed by event kind, in registration order.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    handlers: BTreeMap<ServerEventKind, Vec<(u64, Handler)>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`.
    pub fn subscribe(&mut self, kind: ServerEventKind, handler: Handler) -> Subscription {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.handlers.entry(kind).or_default().push((id, handler));
        Subscription { kind, id }
    }

    /// Removes one handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let Some(list) = self.handlers.get_mut(&subscription.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != subscription.id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(&subscription.kind);
        }
        removed
    }

    /// Removes every handler for `kind`. Returns how many were removed.
    pub fn unsubscribe_all(&mut self, kind: ServerEventKind) -> usize {
        self.handlers.remove(&kind).map_or(0, |list| list.len())
    }

    /// Returns the handlers for `kind`, in registration order.
    #[must_use]
    pub fn handlers_for(&self, kind: ServerEventKind) -> Vec<Handler> {
        self.handlers
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    /// Returns the number of handlers registered for `kind`.
    #[must_use]
    pub fn count(&self, kind: ServerEventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(kind, list)| (kind.as_str(), list.len()))
            .collect();
        f.debug_struct("SubscriptionRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn fire(registry: &SubscriptionRegistry, kind: ServerEventKind) {
        let event = ServerEvent::QueueUpdated(serde_json::Value::Null);
        for handler in registry.handlers_for(kind) {
            handler(&event);
        }
    }

    #[test]
    fn empty_registry_has_no_handlers() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.handlers_for(ServerEventKind::QueueUpdated).is_empty());
    }

    #[test]
    fn unsubscribe_handle_removes_only_that_handler() {
        let mut registry = SubscriptionRegistry::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let sub_a = registry.subscribe(ServerEventKind::QueueUpdated, counting(&a));
        let _sub_b = registry.subscribe(ServerEventKind::QueueUpdated, counting(&b));

        assert!(registry.unsubscribe(sub_a));
        assert!(!registry.unsubscribe(sub_a));
        fire(&registry, ServerEventKind::QueueUpdated);

        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_all_clears_kind() {
        let mut registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.subscribe(ServerEventKind::QueueUpdated, counting(&hits));
        registry.subscribe(ServerEventKind::QueueUpdated, counting(&hits));
        registry.subscribe(ServerEventKind::Notification, counting(&hits));

        assert_eq!(registry.unsubscribe_all(ServerEventKind::QueueUpdated), 2);
        fire(&registry, ServerEventKind::QueueUpdated);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(registry.count(ServerEventKind::Notification), 1);
    }

    #[test]
    fn handles_are_distinct() {
        let mut registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let a = registry.subscribe(ServerEventKind::NewPatient, counting(&hits));
        let b = registry.subscribe(ServerEventKind::NewPatient, counting(&hits));
        assert_ne!(a, b);
        assert_eq!(a.kind(), ServerEventKind::NewPatient);
    }
}
