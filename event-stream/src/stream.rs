//! The pull-based event stream
//!
//! `EventStream` is the consumer-facing driver. Each pull drains the bridge
//! buffer in arrival order, applying the transform to every item; when the
//! buffer is empty and the source is still active it races the bridge signal
//! against the active deadline. Every terminal path (end, limit, source
//! error, timeout, close, drop) detaches the bridge exactly once.
//!
//! The keep-alive task is spawned on the runtime driving the stream the first
//! time a pull waits without a deadline, so building a stream never needs a
//! runtime.

use std::fmt;
use std::time::Duration;

use event_source::EventSource;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::time::Instant;

use crate::bridge::{Bridge, Next};
use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::keep_alive::KeepAlive;
use crate::race::{RaceOutcome, RaceSelector};

/// Per-item transform applied before an item is yielded
pub(crate) enum Transform<P, O> {
    Sync(Box<dyn FnMut(P) -> O + Send>),
    Async(Box<dyn FnMut(P) -> BoxFuture<'static, O> + Send>),
}

impl<P: Send + 'static> Transform<P, P> {
    pub(crate) fn identity() -> Self {
        Transform::Sync(Box::new(|payload: P| payload))
    }
}

impl<P, O> Transform<P, O> {
    async fn apply(&mut self, payload: P) -> O {
        match self {
            Transform::Sync(f) => f(payload),
            Transform::Async(f) => f(payload).await,
        }
    }
}

/// Counters describing a stream's progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStats {
    /// Items received from the source
    pub items_received: u64,

    /// Items yielded to the consumer
    pub items_yielded: u64,

    /// Items waiting in the buffer
    pub buffered: usize,

    /// Timeouts that ended the stream (0 or 1)
    pub timeouts: u64,
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Event Stream Stats:")?;
        writeln!(f, "  Items received: {}", self.items_received)?;
        writeln!(f, "  Items yielded: {}", self.items_yielded)?;
        writeln!(f, "  Buffered: {}", self.buffered)?;
        writeln!(f, "  Timeouts: {}", self.timeouts)?;
        Ok(())
    }
}

/// Single-pass, ordered stream over a push-based event source
///
/// Build one with [`from_events`](crate::from_events) or
/// [`EventStreamBuilder`](crate::EventStreamBuilder).
///
/// # Example
///
/// ```rust,ignore
/// let mut stream = from_events(emitter.clone(), StreamConfig::default())?;
///
/// while let Some(item) = stream.next_async().await {
///     match item {
///         Ok(payload) => println!("{payload:?}"),
///         Err(e) if e.is_timeout() => break,
///         Err(e) => return Err(e.into()),
///     }
/// }
/// ```
pub struct EventStream<S: EventSource, O> {
    bridge: Bridge<S>,
    selector: RaceSelector,
    transform: Transform<S::Payload, O>,
    keep_alive: Option<KeepAlive>,
    /// Interval for the keep-alive, `None` when every phase is timed
    keep_alive_interval: Option<Duration>,
    /// Only the first-item phase is untimed
    untimed_until_first_item: bool,
    limit: Option<usize>,
    items_yielded: u64,
    timeouts: u64,
    terminated: bool,
}

impl<S: EventSource, O> EventStream<S, O> {
    /// Validate `config` and attach to `source`
    pub(crate) fn new(
        source: S,
        config: StreamConfig,
        transform: Transform<S::Payload, O>,
    ) -> Result<Self> {
        config.validate()?;

        let bridge = Bridge::attach(source, &config)?;

        let keep_alive_interval = config
            .needs_keep_alive()
            .then_some(config.keep_alive_interval);
        // Between-items only: the untimed phase ends with the first item
        let untimed_until_first_item =
            config.first_item_timeout.is_none() && config.between_items_timeout.is_some();

        let selector = RaceSelector::new(
            config.first_item_timeout,
            config.between_items_timeout,
            bridge.started_at(),
        );

        Ok(Self {
            bridge,
            selector,
            transform,
            keep_alive: None,
            keep_alive_interval,
            untimed_until_first_item,
            limit: config.limit,
            items_yielded: 0,
            timeouts: 0,
            terminated: false,
        })
    }

    /// Pull the next item
    ///
    /// Returns `None` once the source ended or the limit was reached, and
    /// `Some(Err(_))` exactly once for a source error or timeout. After any
    /// terminal outcome every call returns `None`.
    pub async fn next_async(&mut self) -> Option<std::result::Result<O, StreamError<S::Payload>>> {
        if self.terminated {
            return None;
        }

        loop {
            match self.bridge.take_next() {
                Next::Item(payload) => {
                    self.selector.record_progress();
                    tokio::task::yield_now().await;

                    let output = self.transform.apply(payload).await;
                    self.items_yielded += 1;
                    tracing::trace!("Yielding item {}", self.items_yielded);

                    if let Some(limit) = self.limit {
                        if self.items_yielded >= limit as u64 {
                            tracing::debug!("Limit of {} item(s) reached", limit);
                            self.finish();
                        }
                    }
                    return Some(Ok(output));
                }
                Next::Error(error) => {
                    tracing::debug!(
                        "Source reported an error after {} item(s)",
                        self.items_yielded
                    );
                    self.finish();
                    return Some(Err(StreamError::Source(error)));
                }
                Next::Ended => {
                    tracing::debug!("Source ended after {} item(s)", self.items_yielded);
                    self.finish();
                    return None;
                }
                Next::Empty => {
                    if !self.selector.is_timed() {
                        self.ensure_keep_alive();
                    }

                    let bridge = &self.bridge;
                    let outcome = self
                        .selector
                        .race(bridge.notified(), || bridge.has_pending())
                        .await;

                    if let RaceOutcome::TimedOut { phase, timeout } = outcome {
                        tracing::warn!(
                            "No {} within {:?}, closing stream after {} item(s)",
                            phase,
                            timeout,
                            self.items_yielded
                        );
                        self.timeouts += 1;
                        self.finish();
                        return Some(Err(StreamError::Timeout { phase, timeout }));
                    }
                }
            }
        }
    }

    /// Stop the stream early, detaching from the source
    ///
    /// Items still buffered are discarded. Calling `close` on a finished
    /// stream has no effect.
    pub fn close(&mut self) {
        if !self.terminated {
            tracing::debug!("Stream closed by consumer");
            self.finish();
        }
    }

    /// Whether the stream reached a terminal state
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// When the stream attached to its source
    pub fn started_at(&self) -> Instant {
        self.bridge.started_at()
    }

    /// Current counters
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            items_received: self.bridge.items_received(),
            items_yielded: self.items_yielded,
            buffered: self.bridge.buffered(),
            timeouts: self.timeouts,
        }
    }

    /// Whether a keep-alive task is still ticking for this stream
    pub fn keep_alive_running(&self) -> bool {
        self.keep_alive
            .as_ref()
            .map(|keep_alive| !keep_alive.is_finished())
            .unwrap_or(false)
    }

    /// Convert into a `futures::Stream`, consuming the driver
    pub fn into_stream(self) -> BoxStream<'static, std::result::Result<O, StreamError<S::Payload>>>
    where
        S: Send + Sync + 'static,
        O: Send + 'static,
    {
        stream::unfold(self, |mut driver| async move {
            driver.next_async().await.map(|item| (item, driver))
        })
        .boxed()
    }

    /// Start the keep-alive on the current runtime, once
    fn ensure_keep_alive(&mut self) {
        if self.keep_alive.is_some() {
            return;
        }
        let Some(interval) = self.keep_alive_interval else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No Tokio runtime, waiting without keep-alive");
            return;
        };

        let liveness = self.bridge.liveness();
        let untimed_until_first_item = self.untimed_until_first_item;
        self.keep_alive = Some(KeepAlive::start(&runtime, interval, move || {
            liveness.is_attached() && (!untimed_until_first_item || liveness.items_received() == 0)
        }));
    }

    fn finish(&mut self) {
        self.terminated = true;
        self.bridge.detach();
        if let Some(keep_alive) = &self.keep_alive {
            keep_alive.shutdown();
        }
    }
}

impl<S: EventSource, O> fmt::Debug for EventStream<S, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("bridge", &self.bridge)
            .field("phase", &self.selector.phase())
            .field("limit", &self.limit)
            .field("items_yielded", &self.items_yielded)
            .field("terminated", &self.terminated)
            .finish()
    }
}
