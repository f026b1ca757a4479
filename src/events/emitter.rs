//! Hierarchical event emitter.
//!
//! Emitters form a tree mirroring the handle hierarchy (client → database →
//! collection/table). Emission runs the origin node's listeners in
//! registration order, then bubbles to the parent unless a listener stopped
//! propagation. Children hold a reference to their parent; parents never
//! reference children, so there are no ownership cycles.

use super::{CommandEvent, EventFamily, EventName};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Handle returned by [`EventEmitter::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&CommandEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    callback: Callback,
}

/// One node in the emitter tree.
pub struct EventEmitter {
    parent: Option<Arc<EventEmitter>>,
    listeners: RwLock<HashMap<EventName, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates a root emitter (client scope).
    #[must_use]
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Creates a child emitter that bubbles into `self`.
    #[must_use]
    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(self)),
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Registers a listener for one event name.
    ///
    /// # Panics
    ///
    /// Panics if the internal listener lock is poisoned.
    pub fn on<F>(&self, name: EventName, callback: F) -> ListenerId
    where
        F: Fn(&CommandEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .expect("listener lock poisoned")
            .entry(name)
            .or_default()
            .push(Listener {
                id,
                callback: Arc::new(callback),
            });
        id
    }

    /// Removes a listener previously registered with [`Self::on`].
    ///
    /// # Panics
    ///
    /// Panics if the internal listener lock is poisoned.
    pub fn off(&self, name: EventName, id: ListenerId) {
        if let Some(list) = self
            .listeners
            .write()
            .expect("listener lock poisoned")
            .get_mut(&name)
        {
            list.retain(|l| l.id != id);
        }
    }

    /// True when a listener for any event of `family` is attached to this
    /// node or any ancestor. Used to skip request-id generation when nobody
    /// is listening.
    #[must_use]
    pub fn has_family_listeners(&self, family: EventFamily) -> bool {
        let here = {
            let listeners = self.listeners.read().expect("listener lock poisoned");
            listeners
                .iter()
                .any(|(name, list)| name.family() == family && !list.is_empty())
        };
        here || self
            .parent
            .as_ref()
            .is_some_and(|p| p.has_family_listeners(family))
    }

    /// Emits an event at this node and bubbles it toward the root.
    ///
    /// Listener callbacks run outside the lock, so a callback may register or
    /// remove listeners without deadlocking; such changes take effect for the
    /// next emission.
    pub fn emit(&self, event: &CommandEvent) {
        let callbacks: Vec<Callback> = {
            let listeners = self.listeners.read().expect("listener lock poisoned");
            listeners
                .get(&event.name)
                .map(|list| list.iter().map(|l| Arc::clone(&l.callback)).collect())
                .unwrap_or_default()
        };

        for callback in callbacks {
            callback(event);
            if event.is_stopped_immediately() {
                return;
            }
        }

        if event.is_stopped() {
            return;
        }

        if let Some(parent) = &self.parent {
            parent.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventPayload, EventRequestInfo};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn started_event() -> CommandEvent {
        CommandEvent::new(
            EventName::CommandStarted,
            String::new(),
            EventRequestInfo::default(),
            EventPayload::Started,
        )
    }

    #[test]
    fn test_emission_bubbles_to_parent() {
        let root = EventEmitter::root();
        let child = root.child();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        child.on(EventName::CommandStarted, move |_| {
            o.lock().unwrap().push("child");
        });
        let o = Arc::clone(&order);
        root.on(EventName::CommandStarted, move |_| {
            o.lock().unwrap().push("root");
        });

        child.emit(&started_event());
        assert_eq!(*order.lock().unwrap(), vec!["child", "root"]);
    }

    #[test]
    fn test_stop_propagation_halts_bubbling() {
        let root = EventEmitter::root();
        let child = root.child();
        let root_hits = Arc::new(AtomicUsize::new(0));

        child.on(EventName::CommandStarted, |ev| ev.stop_propagation());
        let hits = Arc::clone(&root_hits);
        root.on(EventName::CommandStarted, move |_| {
            hits.fetch_add(1, Ordering::Relaxed);
        });

        child.emit(&started_event());
        assert_eq!(root_hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_stop_immediate_skips_remaining_local_listeners() {
        let emitter = EventEmitter::root();
        let second_ran = Arc::new(AtomicUsize::new(0));

        emitter.on(EventName::CommandStarted, |ev| {
            ev.stop_immediate_propagation();
        });
        let ran = Arc::clone(&second_ran);
        emitter.on(EventName::CommandStarted, move |_| {
            ran.fetch_add(1, Ordering::Relaxed);
        });

        emitter.emit(&started_event());
        assert_eq!(second_ran.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_off_removes_listener() {
        let emitter = EventEmitter::root();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let id = emitter.on(EventName::CommandSucceeded, move |_| {
            h.fetch_add(1, Ordering::Relaxed);
        });
        emitter.off(EventName::CommandSucceeded, id);

        emitter.emit(&CommandEvent::new(
            EventName::CommandSucceeded,
            String::new(),
            EventRequestInfo::default(),
            EventPayload::Succeeded { duration_ms: 1 },
        ));
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_family_listener_detection_walks_ancestors() {
        let root = EventEmitter::root();
        let child = root.child();
        assert!(!child.has_family_listeners(EventFamily::Command));

        root.on(EventName::CommandFailed, |_| {});
        assert!(child.has_family_listeners(EventFamily::Command));
        assert!(!child.has_family_listeners(EventFamily::AdminCommand));
    }

    #[test]
    fn test_listener_may_mutate_listeners_during_emission() {
        let emitter = EventEmitter::root();
        let emitter_clone = Arc::clone(&emitter);
        emitter.on(EventName::CommandStarted, move |_| {
            emitter_clone.on(EventName::CommandStarted, |_| {});
        });
        // Must not deadlock.
        emitter.emit(&started_event());
    }
}
