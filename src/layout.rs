//! Layout-change notifications with scoped subscriptions.
//!
//! Every subscriber gets its own registration; dropping the returned
//! [`LayoutSubscription`] removes it, so views never overwrite each other's
//! handlers and never outlive their registration.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutEvent {
    /// Terminal or window size changed.
    Resized,
    /// Panes rearranged (e.g. a splitter moved).
    Rearranged,
}

type Handler = Box<dyn Fn(&LayoutEvent) + Send>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: BTreeMap<u64, Handler>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct LayoutEvents {
    registry: Arc<Mutex<Registry>>,
}

impl LayoutEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` until the returned guard is dropped.
    ///
    /// Handlers run while the registry is locked and must not subscribe or
    /// emit themselves.
    #[must_use = "dropping the subscription unregisters the handler immediately"]
    pub fn subscribe<F>(&self, handler: F) -> LayoutSubscription
    where
        F: Fn(&LayoutEvent) + Send + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.insert(id, Box::new(handler));
        tracing::trace!(id, "Layout handler registered");
        LayoutSubscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every live subscriber; returns how many ran.
    pub fn emit(&self, event: LayoutEvent) -> usize {
        let registry = lock(&self.registry);
        for handler in registry.handlers.values() {
            handler(&event);
        }
        registry.handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).handlers.len()
    }
}

impl std::fmt::Debug for LayoutEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEvents")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Registration guard returned by [`LayoutEvents::subscribe`].
#[derive(Debug)]
pub struct LayoutSubscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for LayoutSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).handlers.remove(&self.id);
            tracing::trace!(id = self.id, "Layout handler unregistered");
        }
    }
}
