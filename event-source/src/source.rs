//! The EventSource trait
//!
//! An event source pushes named notifications to subscribed handlers. It is
//! the only contract a consumer such as a pull-based stream adapter needs
//! from the producer side.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use event_source::{EventEmitter, EventSource};
//!
//! let emitter = EventEmitter::<u32>::new();
//! let id = emitter.on("data", Arc::new(|n: u32| println!("got {n}")));
//!
//! emitter.emit("data", 1);
//! assert!(emitter.remove_listener("data", id));
//! ```

use std::sync::Arc;

use crate::listener::{Handler, ListenerId};

/// A push-based notifier of named events
///
/// Implementations must:
/// - invoke handlers registered with [`on`](EventSource::on) for every occurrence
/// - invoke handlers registered with [`once`](EventSource::once) at most once,
///   removing them before the call
/// - only remove the listener identified by the given id in
///   [`remove_listener`](EventSource::remove_listener)
pub trait EventSource {
    /// Value carried by every notification of this source
    type Payload: Send + 'static;

    /// Subscribe `handler` to every occurrence of `event`
    fn on(&self, event: &str, handler: Handler<Self::Payload>) -> ListenerId;

    /// Subscribe `handler` to the next occurrence of `event` only
    fn once(&self, event: &str, handler: Handler<Self::Payload>) -> ListenerId;

    /// Remove a previously registered listener
    ///
    /// Returns `false` if the listener was not (or no longer) registered.
    fn remove_listener(&self, event: &str, id: ListenerId) -> bool;

    /// Whether the readable side has already finished
    fn readable_ended(&self) -> bool {
        false
    }

    /// Whether the writable side has already finished
    fn writable_ended(&self) -> bool {
        false
    }
}

impl<T: EventSource + ?Sized> EventSource for Arc<T> {
    type Payload = T::Payload;

    fn on(&self, event: &str, handler: Handler<Self::Payload>) -> ListenerId {
        (**self).on(event, handler)
    }

    fn once(&self, event: &str, handler: Handler<Self::Payload>) -> ListenerId {
        (**self).once(event, handler)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        (**self).remove_listener(event, id)
    }

    fn readable_ended(&self) -> bool {
        (**self).readable_ended()
    }

    fn writable_ended(&self) -> bool {
        (**self).writable_ended()
    }
}
