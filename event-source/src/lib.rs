//! Push-based Event Sources
//!
//! A small, dependency-light library describing producers that push named
//! notifications to subscribed callbacks.
//!
//! # Features
//!
//! - **EventSource trait**: the `on` / `once` / `remove_listener` contract a
//!   consumer needs, plus optional "already ended" readiness flags
//! - **Scoped removal**: every subscription returns a [`ListenerId`]; only the
//!   holder of the id can remove that listener
//! - **EventEmitter**: a cloneable, thread-safe in-process implementation
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use event_source::EventEmitter;
//!
//! let emitter = EventEmitter::<u32>::new();
//! let total = Arc::new(Mutex::new(0));
//!
//! let sink = Arc::clone(&total);
//! let id = emitter.on("data", Arc::new(move |n: u32| *sink.lock().unwrap() += n));
//!
//! emitter.emit("data", 2);
//! emitter.emit("data", 3);
//! emitter.remove_listener("data", id);
//! emitter.emit("data", 100);
//!
//! assert_eq!(*total.lock().unwrap(), 5);
//! ```
//!
//! # Architecture
//!
//! ```text
//! EventEmitter<P>  (Clone = shared handle)
//!     │
//!     └── Registry<P>
//!             ├── listeners: HashMap<event name, Vec<Listener<P>>>
//!             ├── next_id: AtomicU64
//!             └── readable_ended / writable_ended: AtomicBool
//! ```

pub mod emitter;
pub mod listener;
pub mod source;

pub use emitter::EventEmitter;
pub use listener::{Handler, ListenerId, ListenerKind};
pub use source::EventSource;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::emitter::EventEmitter;
    pub use crate::listener::{Handler, ListenerId};
    pub use crate::source::EventSource;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    proptest! {
        #[test]
        fn prop_emit_preserves_order(payloads in proptest::collection::vec(any::<i32>(), 0..64)) {
            let emitter = EventEmitter::<i32>::new();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            emitter.on("data", Arc::new(move |n: i32| sink.lock().unwrap().push(n)));

            for p in &payloads {
                emitter.emit("data", *p);
            }

            prop_assert_eq!(&*seen.lock().unwrap(), &payloads);
        }
    }

    #[test]
    fn test_persistent_and_once_together() {
        let emitter = EventEmitter::<&'static str>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        emitter.on(
            "data",
            Arc::new(move |s: &'static str| a.lock().unwrap().push(format!("on:{s}"))),
        );
        let b = Arc::clone(&seen);
        emitter.once(
            "data",
            Arc::new(move |s: &'static str| b.lock().unwrap().push(format!("once:{s}"))),
        );

        emitter.emit("data", "x");
        emitter.emit("data", "y");

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["on:x".to_string(), "once:x".to_string(), "on:y".to_string()]
        );
    }
}
