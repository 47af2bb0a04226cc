//! Event bridge between a push-based source and the pull-based driver
//!
//! The bridge subscribes to the source's item, error and end notifications,
//! buffers item payloads in arrival order and records completion and error
//! flags. It owns its subscriptions: `detach` removes exactly the listeners
//! it registered and nothing else.
//!
//! Once the source reported an error or an end, later items are dropped: the
//! buffer only holds what arrived before the terminal notification, so a
//! source that keeps emitting cannot hold back the outcome.
//!
//! Handlers may fire on any thread. `attach` subscribes to end and error
//! notifications before items and re-checks the source's ended flags after
//! subscribing; a source that finishes concurrently with `attach` is either
//! observed through its end notification or rejected.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use event_source::{EventSource, ListenerId};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::StreamConfig;
use crate::error::{ConfigurationError, Result};

/// What the driver should do next
#[derive(Debug, PartialEq, Eq)]
pub enum Next<P> {
    /// The oldest buffered item
    Item(P),
    /// The buffer is empty and the source reported an error
    Error(P),
    /// The buffer is empty and the source ended
    Ended,
    /// The buffer is empty and the source is still active
    Empty,
}

/// Mutable state written by notification handlers
#[derive(Debug)]
struct BridgeState<P> {
    /// Items awaiting delivery, oldest first
    buffer: VecDeque<P>,

    /// False once any end notification fired
    active: bool,

    /// First error reported by the source
    pending_error: Option<P>,

    /// Items appended since attach
    items_received: u64,
}

/// State shared between the bridge and its handlers
#[derive(Debug)]
struct Shared<P> {
    state: Mutex<BridgeState<P>>,
    signal: Notify,
}

impl<P> Shared<P> {
    fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState {
                buffer: VecDeque::new(),
                active: true,
                pending_error: None,
                items_received: 0,
            }),
            signal: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_item(&self, payload: P) {
        {
            let mut state = self.lock();
            if !state.active || state.pending_error.is_some() {
                tracing::trace!("Dropping item received after a terminal notification");
                return;
            }
            state.buffer.push_back(payload);
            state.items_received += 1;
        }
        self.signal.notify_one();
    }

    fn capture_error(&self, error: P) {
        {
            let mut state = self.lock();
            if state.pending_error.is_none() {
                state.pending_error = Some(error);
            }
        }
        self.signal.notify_one();
    }

    fn mark_ended(&self) {
        self.lock().active = false;
        self.signal.notify_one();
    }
}

/// Read-only view of a bridge that can outlive a borrow of it
#[derive(Debug)]
pub struct Liveness<P> {
    shared: Arc<Shared<P>>,
    detached: Arc<AtomicBool>,
}

impl<P> Liveness<P> {
    /// Whether the bridge still holds its subscriptions
    pub fn is_attached(&self) -> bool {
        !self.detached.load(Ordering::SeqCst)
    }

    /// Items received by the bridge so far
    pub fn items_received(&self) -> u64 {
        self.shared.lock().items_received
    }
}

impl<P> Clone for Liveness<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            detached: Arc::clone(&self.detached),
        }
    }
}

/// Subscription to a source plus the buffer it feeds
pub struct Bridge<S: EventSource> {
    source: S,
    shared: Arc<Shared<S::Payload>>,

    /// Every (event name, listener id) this bridge registered
    subscriptions: Vec<(String, ListenerId)>,

    detached: Arc<AtomicBool>,
    started_at: Instant,
}

impl<S: EventSource> Bridge<S> {
    /// Subscribe to `source` according to `config`
    ///
    /// Fails without subscribing if the source reports it already ended.
    pub fn attach(source: S, config: &StreamConfig) -> Result<Self> {
        Self::check_source(&source)?;

        let shared = Arc::new(Shared::new());
        let mut subscriptions = Vec::with_capacity(config.end_events.len() + 2);

        for end_event in &config.end_events {
            let ends = Arc::clone(&shared);
            let id = source.once(end_event, Arc::new(move |_: S::Payload| ends.mark_ended()));
            subscriptions.push((end_event.clone(), id));
        }

        let errors = Arc::clone(&shared);
        let id = source.once(
            &config.error_event,
            Arc::new(move |error: S::Payload| errors.capture_error(error)),
        );
        subscriptions.push((config.error_event.clone(), id));

        let items = Arc::clone(&shared);
        let id = source.on(
            &config.item_event,
            Arc::new(move |payload: S::Payload| items.push_item(payload)),
        );
        subscriptions.push((config.item_event.clone(), id));

        let bridge = Self {
            source,
            shared,
            subscriptions,
            detached: Arc::new(AtomicBool::new(false)),
            started_at: Instant::now(),
        };

        // The source may have finished while we were subscribing
        if !bridge.is_active() {
            return Ok(bridge);
        }
        if let Err(e) = Self::check_source(&bridge.source) {
            bridge.detach();
            return Err(e);
        }

        tracing::debug!(
            "Bridge attached: item '{}', error '{}', end {:?}",
            config.item_event,
            config.error_event,
            config.end_events
        );

        Ok(bridge)
    }

    fn check_source(source: &S) -> Result<()> {
        let readable_ended = source.readable_ended();
        let writable_ended = source.writable_ended();
        if readable_ended || writable_ended {
            return Err(ConfigurationError::InvalidSourceState {
                readable_ended,
                writable_ended,
            });
        }
        Ok(())
    }

    /// Take the next thing the driver must handle
    ///
    /// Buffered items come first, so items that arrived before an error or
    /// end notification are still delivered.
    pub fn take_next(&self) -> Next<S::Payload> {
        let mut state = self.shared.lock();

        if let Some(item) = state.buffer.pop_front() {
            return Next::Item(item);
        }
        if let Some(error) = state.pending_error.take() {
            return Next::Error(error);
        }
        if !state.active {
            return Next::Ended;
        }
        Next::Empty
    }

    /// Whether `take_next` would return something other than `Empty`
    pub fn has_pending(&self) -> bool {
        let state = self.shared.lock();
        !state.buffer.is_empty() || state.pending_error.is_some() || !state.active
    }

    /// Future resolving once any handler fired since the last wake-up
    pub fn notified(&self) -> Notified<'_> {
        self.shared.signal.notified()
    }

    /// Remove every listener this bridge registered
    ///
    /// Returns `true` for the call that performed the removal, `false` for
    /// every later call.
    pub fn detach(&self) -> bool {
        if self.detached.swap(true, Ordering::SeqCst) {
            return false;
        }

        let mut removed = 0;
        for (event, id) in &self.subscriptions {
            if self.source.remove_listener(event, *id) {
                removed += 1;
            }
        }

        tracing::debug!(
            "Bridge detached: removed {} of {} listener(s)",
            removed,
            self.subscriptions.len()
        );
        true
    }

    /// Whether `detach` already ran
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// False once an end notification fired
    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    /// Items received since attach
    pub fn items_received(&self) -> u64 {
        self.shared.lock().items_received
    }

    /// Items waiting in the buffer
    pub fn buffered(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    /// When the bridge attached
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// A handle for observing the bridge from another task
    pub fn liveness(&self) -> Liveness<S::Payload> {
        Liveness {
            shared: Arc::clone(&self.shared),
            detached: Arc::clone(&self.detached),
        }
    }
}

impl<S: EventSource> Drop for Bridge<S> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<S: EventSource> std::fmt::Debug for Bridge<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("subscriptions", &self.subscriptions)
            .field("detached", &self.is_detached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_source::EventEmitter;

    fn attach(emitter: &EventEmitter<i32>) -> Bridge<EventEmitter<i32>> {
        Bridge::attach(emitter.clone(), &StreamConfig::default()).unwrap()
    }

    /// Emitter that finishes while the bridge is still subscribing
    struct FinishingSource {
        emitter: EventEmitter<i32>,
        fire_end: bool,
    }

    impl EventSource for FinishingSource {
        type Payload = i32;

        fn on(&self, event: &str, handler: event_source::Handler<i32>) -> ListenerId {
            let id = self.emitter.on(event, handler);
            if self.fire_end {
                self.emitter.emit("end", 0);
            } else {
                self.emitter.set_readable_ended(true);
            }
            id
        }

        fn once(&self, event: &str, handler: event_source::Handler<i32>) -> ListenerId {
            self.emitter.once(event, handler)
        }

        fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
            self.emitter.remove_listener(event, id)
        }

        fn readable_ended(&self) -> bool {
            EventSource::readable_ended(&self.emitter)
        }
    }

    #[test]
    fn test_attach_subscribes_every_event() {
        let emitter = EventEmitter::new();
        let _bridge = attach(&emitter);

        assert_eq!(emitter.listener_count("data"), 1);
        assert_eq!(emitter.listener_count("error"), 1);
        assert_eq!(emitter.listener_count("close"), 1);
        assert_eq!(emitter.listener_count("end"), 1);
    }

    #[test]
    fn test_attach_rejects_finished_source() {
        let emitter = EventEmitter::<i32>::new();
        emitter.set_writable_ended(true);

        let result = Bridge::attach(emitter.clone(), &StreamConfig::default());
        match result {
            Err(ConfigurationError::InvalidSourceState {
                readable_ended,
                writable_ended,
            }) => {
                assert!(!readable_ended);
                assert!(writable_ended);
            }
            other => panic!("Expected InvalidSourceState, got {:?}", other.map(|_| ())),
        }
        assert!(emitter.event_names().is_empty());
    }

    #[test]
    fn test_items_are_buffered_in_order() {
        let emitter = EventEmitter::new();
        let bridge = attach(&emitter);

        emitter.emit("data", 1);
        emitter.emit("data", 0);
        emitter.emit("data", 3);

        assert_eq!(bridge.buffered(), 3);
        assert_eq!(bridge.take_next(), Next::Item(1));
        assert_eq!(bridge.take_next(), Next::Item(0));
        assert_eq!(bridge.take_next(), Next::Item(3));
        assert_eq!(bridge.take_next(), Next::Empty);
        assert_eq!(bridge.items_received(), 3);
    }

    #[test]
    fn test_buffered_items_come_before_error() {
        let emitter = EventEmitter::new();
        let bridge = attach(&emitter);

        emitter.emit("data", 1);
        emitter.emit("error", -1);
        emitter.emit("error", -2);

        assert!(bridge.has_pending());
        assert_eq!(bridge.take_next(), Next::Item(1));
        assert_eq!(bridge.take_next(), Next::Error(-1));
        assert_eq!(bridge.take_next(), Next::Empty);
    }

    #[test]
    fn test_any_end_event_ends() {
        let emitter = EventEmitter::new();
        let bridge = attach(&emitter);

        emitter.emit("data", 7);
        emitter.emit("close", 0);

        assert!(!bridge.is_active());
        assert_eq!(bridge.take_next(), Next::Item(7));
        assert_eq!(bridge.take_next(), Next::Ended);
        assert_eq!(bridge.take_next(), Next::Ended);
    }

    #[test]
    fn test_items_after_terminal_notification_are_dropped() {
        let emitter = EventEmitter::new();
        let bridge = attach(&emitter);

        emitter.emit("data", 1);
        emitter.emit("error", -1);
        for n in 2..6 {
            emitter.emit("data", n);
        }

        assert_eq!(bridge.items_received(), 1);
        assert_eq!(bridge.take_next(), Next::Item(1));
        assert_eq!(bridge.take_next(), Next::Error(-1));

        let ended = attach(&emitter);
        emitter.emit("end", 0);
        emitter.emit("data", 9);
        assert_eq!(ended.take_next(), Next::Ended);
    }

    #[test]
    fn test_end_fired_while_attaching_is_observed() {
        let emitter = EventEmitter::new();
        let source = FinishingSource {
            emitter: emitter.clone(),
            fire_end: true,
        };

        let bridge = Bridge::attach(source, &StreamConfig::default()).unwrap();
        assert!(!bridge.is_active());
        assert_eq!(bridge.take_next(), Next::Ended);
    }

    #[test]
    fn test_source_finished_while_attaching_is_rejected() {
        let emitter = EventEmitter::new();
        let source = FinishingSource {
            emitter: emitter.clone(),
            fire_end: false,
        };

        let result = Bridge::attach(source, &StreamConfig::default());
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidSourceState {
                readable_ended: true,
                writable_ended: false,
            })
        ));
        assert!(emitter.event_names().is_empty());
    }

    #[test]
    fn test_error_takes_priority_over_end() {
        let emitter = EventEmitter::new();
        let bridge = attach(&emitter);

        emitter.emit("end", 0);
        emitter.emit("error", 42);

        assert_eq!(bridge.take_next(), Next::Error(42));
        assert_eq!(bridge.take_next(), Next::Ended);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let emitter = EventEmitter::new();
        let bridge = attach(&emitter);

        assert!(bridge.detach());
        assert!(!bridge.detach());
        assert!(bridge.is_detached());
        assert!(emitter.event_names().is_empty());

        // Notifications after detach are not buffered
        emitter.emit("data", 1);
        assert_eq!(bridge.take_next(), Next::Empty);
    }

    #[test]
    fn test_detach_leaves_foreign_listeners() {
        let emitter = EventEmitter::new();
        emitter.on("data", Arc::new(|_: i32| {}));
        emitter.once("end", Arc::new(|_: i32| {}));

        let bridge = attach(&emitter);
        assert_eq!(emitter.listener_count("data"), 2);

        bridge.detach();
        assert_eq!(emitter.listener_count("data"), 1);
        assert_eq!(emitter.listener_count("end"), 1);
        assert_eq!(emitter.listener_count("error"), 0);
    }

    #[test]
    fn test_drop_detaches() {
        let emitter = EventEmitter::new();
        let bridge = attach(&emitter);
        let liveness = bridge.liveness();

        assert!(liveness.is_attached());
        drop(bridge);

        assert!(!liveness.is_attached());
        assert!(emitter.event_names().is_empty());
    }

    #[test]
    fn test_independent_bridges() {
        let emitter = EventEmitter::new();
        let first = attach(&emitter);
        let second = attach(&emitter);

        emitter.emit("data", 5);
        first.detach();
        emitter.emit("data", 6);

        assert_eq!(first.take_next(), Next::Item(5));
        assert_eq!(first.take_next(), Next::Empty);
        assert_eq!(second.take_next(), Next::Item(5));
        assert_eq!(second.take_next(), Next::Item(6));
        assert_eq!(emitter.listener_count("data"), 1);
    }

    #[tokio::test]
    async fn test_handlers_wake_the_driver() {
        let emitter = EventEmitter::new();
        let bridge = attach(&emitter);

        emitter.emit("data", 1);
        // The stored permit resolves the next wait immediately
        bridge.notified().await;
        assert_eq!(bridge.take_next(), Next::Item(1));
    }
}
