use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, Weak,
};

use log::debug;

use crate::models::Interval;

/// Observer of an active workout. Every callback arrives on the UI thread.
#[allow(unused_variables)]
pub trait RunStateListener: Send + Sync {
    fn on_tick(&self, interval_remaining: &str, total_remaining: &str) {}
    fn on_interval_changed(&self, index: usize, interval: &Interval) {}
    fn on_halfway(&self) {}
    fn on_run_completed(&self) {}
    fn on_run_state_changed(&self, running: bool) {}
    /// The workout could not be set up; the flow should be abandoned.
    fn on_session_declined(&self, reason: &str) {}
}

pub type ObserverId = u64;

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ObserverId, Arc<dyn RunStateListener>)>>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ObserverId, Arc<dyn RunStateListener>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, listener: Arc<dyn RunStateListener>) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, listener));
        debug!("Observer {id} registered");
        id
    }

    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if removed {
            debug!("Observer {id} unregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current listeners. Notifying from the copy lets listeners
    /// register or unregister from inside a callback.
    pub fn snapshot(&self) -> Vec<Arc<dyn RunStateListener>> {
        self.lock().iter().map(|(_, listener)| listener.clone()).collect()
    }
}

/// A UI observer's attachment to the service. Dropping it detaches.
pub struct ObserverBinding {
    registry: Weak<ListenerRegistry>,
    id: ObserverId,
}

impl ObserverBinding {
    pub(crate) fn attach(registry: &Arc<ListenerRegistry>, listener: Arc<dyn RunStateListener>) -> Self {
        let id = registry.register(listener);
        Self {
            registry: Arc::downgrade(registry),
            id,
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn unbind(self) {}
}

impl Drop for ObserverBinding {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quiet;
    impl RunStateListener for Quiet {}

    #[test]
    fn bindings_detach_on_drop() {
        let registry = ListenerRegistry::new();
        let first = ObserverBinding::attach(&registry, Arc::new(Quiet));
        let second = ObserverBinding::attach(&registry, Arc::new(Quiet));
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len(), 2);

        first.unbind();
        assert_eq!(registry.len(), 1);
        drop(second);
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_is_independent_of_later_changes() {
        let registry = ListenerRegistry::new();
        let id = registry.register(Arc::new(Quiet));
        let snapshot = registry.snapshot();

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }
}
