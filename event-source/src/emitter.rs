//! In-process event emitter
//!
//! `EventEmitter<P>` is a cloneable handle over a shared listener registry.
//! Clones observe and mutate the same registry, so one clone can be handed to
//! a consumer while another keeps emitting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::listener::{Handler, Listener, ListenerId, ListenerKind};
use crate::source::EventSource;

/// Shared state behind every clone of an emitter
struct Registry<P> {
    /// Listeners per event name, in registration order
    listeners: RwLock<ListenerMap<P>>,

    /// Counter for generating unique listener ids
    next_id: AtomicU64,

    readable_ended: AtomicBool,
    writable_ended: AtomicBool,
}

type ListenerMap<P> = HashMap<String, Vec<Listener<P>>>;

impl<P> Registry<P> {
    /// Lock the registry for writing, recovering from a poisoned lock
    ///
    /// Handlers never run under the lock, so a poisoned registry still holds
    /// consistent entries.
    fn write(&self) -> RwLockWriteGuard<'_, ListenerMap<P>> {
        self.listeners.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Listener registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ListenerMap<P>> {
        self.listeners.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Listener registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Thread-safe emitter of named events
///
/// Handlers are invoked synchronously by [`emit`](EventEmitter::emit), outside
/// of the registry lock, so a handler may freely subscribe or remove
/// listeners on the emitter that is calling it.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use event_source::EventEmitter;
///
/// let emitter = EventEmitter::<String>::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// emitter.once("greeting", Arc::new(move |msg: String| sink.lock().unwrap().push(msg)));
///
/// assert!(emitter.emit("greeting", "hello".to_string()));
/// assert!(!emitter.emit("greeting", "again".to_string()));
/// assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
/// ```
pub struct EventEmitter<P> {
    registry: Arc<Registry<P>>,
}

impl<P> EventEmitter<P>
where
    P: Clone + Send + 'static,
{
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                listeners: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                readable_ended: AtomicBool::new(false),
                writable_ended: AtomicBool::new(false),
            }),
        }
    }

    /// Register a handler for every occurrence of `event`
    pub fn on(&self, event: &str, handler: Handler<P>) -> ListenerId {
        self.add_listener(event, handler, ListenerKind::Persistent)
    }

    /// Register a handler for the next occurrence of `event`
    pub fn once(&self, event: &str, handler: Handler<P>) -> ListenerId {
        self.add_listener(event, handler, ListenerKind::Once)
    }

    /// Remove the listener with the given id from `event`
    ///
    /// Returns `false` if no such listener is registered.
    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.registry.write();

        let Some(entries) = listeners.get_mut(event) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|listener| listener.id != id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(event);
        }

        if removed {
            tracing::trace!("Removed {} from '{}'", id, event);
        }
        removed
    }

    /// Remove every listener registered for `event`
    ///
    /// Returns the number of listeners removed.
    pub fn remove_all_listeners(&self, event: &str) -> usize {
        self.registry
            .write()
            .remove(event)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Fire `event` with `payload`
    ///
    /// Handlers run in registration order. `once` listeners are removed before
    /// any handler is invoked. Returns whether any listener was registered.
    pub fn emit(&self, event: &str, payload: P) -> bool {
        let fired: Vec<Listener<P>> = {
            let mut listeners = self.registry.write();

            let Some(entries) = listeners.get_mut(event) else {
                return false;
            };

            let fired = entries.clone();
            entries.retain(|listener| listener.kind == ListenerKind::Persistent);
            if entries.is_empty() {
                listeners.remove(event);
            }
            fired
        };

        tracing::trace!("Emitting '{}' to {} listener(s)", event, fired.len());

        if let Some((last, rest)) = fired.split_last() {
            for listener in rest {
                (listener.handler)(payload.clone());
            }
            (last.handler)(payload);
        }

        !fired.is_empty()
    }

    /// Number of listeners currently registered for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .read()
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Names of all events with at least one listener
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Mark the readable side as finished (or not)
    pub fn set_readable_ended(&self, ended: bool) {
        self.registry.readable_ended.store(ended, Ordering::SeqCst);
    }

    /// Mark the writable side as finished (or not)
    pub fn set_writable_ended(&self, ended: bool) {
        self.registry.writable_ended.store(ended, Ordering::SeqCst);
    }

    fn add_listener(&self, event: &str, handler: Handler<P>, kind: ListenerKind) -> ListenerId {
        let id = ListenerId::new(self.registry.next_id.fetch_add(1, Ordering::Relaxed));

        self.registry
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, kind, handler });

        tracing::trace!("Registered {} on '{}' ({:?})", id, event, kind);
        id
    }
}

impl<P> EventSource for EventEmitter<P>
where
    P: Clone + Send + 'static,
{
    type Payload = P;

    fn on(&self, event: &str, handler: Handler<P>) -> ListenerId {
        EventEmitter::on(self, event, handler)
    }

    fn once(&self, event: &str, handler: Handler<P>) -> ListenerId {
        EventEmitter::once(self, event, handler)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        EventEmitter::remove_listener(self, event, id)
    }

    fn readable_ended(&self) -> bool {
        self.registry.readable_ended.load(Ordering::SeqCst)
    }

    fn writable_ended(&self) -> bool {
        self.registry.writable_ended.load(Ordering::SeqCst)
    }
}

impl<P> Default for EventEmitter<P>
where
    P: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for EventEmitter<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P> std::fmt::Debug for EventEmitter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events = self.registry.read().len();
        f.debug_struct("EventEmitter")
            .field("event_count", &events)
            .finish()
    }
}
