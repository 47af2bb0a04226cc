//! Listener handles and registrations
//!
//! Every subscription made against an [`EventSource`](crate::EventSource)
//! returns a [`ListenerId`]. The id is the only way to remove the listener
//! again, which guarantees a subscriber can never remove a handler that some
//! other consumer registered on the same source.

use std::fmt;
use std::sync::Arc;

/// Callback invoked with the payload of a fired event
pub type Handler<P> = Arc<dyn Fn(P) + Send + Sync>;

/// Opaque token identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Create a ListenerId from a raw value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// How long a listener stays registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    /// Fires on every occurrence until removed
    Persistent,
    /// Fires on the next occurrence, then removes itself
    Once,
}

/// A handler registered for one event name
pub(crate) struct Listener<P> {
    pub(crate) id: ListenerId,
    pub(crate) kind: ListenerKind,
    pub(crate) handler: Handler<P>,
}

impl<P> Clone for Listener<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<P> fmt::Debug for Listener<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_id_display() {
        let id = ListenerId::new(7);
        assert_eq!(id.to_string(), "listener-7");
        assert_eq!(id.as_u64(), 7);
    }

    #[test]
    fn test_listener_clone_shares_handler() {
        let handler: Handler<u32> = Arc::new(|_: u32| {});
        let listener = Listener {
            id: ListenerId::new(1),
            kind: ListenerKind::Once,
            handler: Arc::clone(&handler),
        };
        let cloned = listener.clone();

        assert_eq!(cloned.id, listener.id);
        assert_eq!(cloned.kind, ListenerKind::Once);
        // original + listener + clone
        assert_eq!(Arc::strong_count(&handler), 3);
    }
}
