//! Builder for creating and configuring an EventStream.
//!
//! The `EventStreamBuilder` provides a fluent API for choosing the options
//! record and the per-item transform. The transform may be synchronous or
//! asynchronous; without one, payloads are yielded unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use event_stream::{EventStreamBuilder, StreamConfig};
//! use std::time::Duration;
//!
//! let stream = EventStreamBuilder::new(emitter.clone())
//!     .config(StreamConfig::new().with_first_item_timeout(Duration::from_secs(5)))
//!     .transform(|payload: serde_json::Value| payload["id"].as_u64())
//!     .build()?;
//! ```

use std::future::Future;

use event_source::EventSource;
use futures::FutureExt;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::stream::{EventStream, Transform};

/// Builder for creating and configuring an EventStream.
///
/// # Validation
///
/// `build()` validates the configuration and the source before subscribing:
/// - event names must be non-empty and used for a single role
/// - end events must form a non-empty set
/// - timeouts, limit and keep-alive interval must be greater than 0
/// - the source must not have ended already
pub struct EventStreamBuilder<S: EventSource, O> {
    /// Source to bridge
    source: S,
    /// Options record
    config: StreamConfig,
    /// Per-item transform
    transform: Transform<S::Payload, O>,
}

impl<S: EventSource> EventStreamBuilder<S, S::Payload> {
    /// Create a builder with the default configuration and no transform.
    pub fn new(source: S) -> Self {
        Self {
            source,
            config: StreamConfig::default(),
            transform: Transform::identity(),
        }
    }
}

impl<S: EventSource, O> EventStreamBuilder<S, O> {
    /// Replace the options record.
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Apply a synchronous transform to every item.
    ///
    /// Replaces any previously set transform.
    pub fn transform<T, F>(self, f: F) -> EventStreamBuilder<S, T>
    where
        F: FnMut(S::Payload) -> T + Send + 'static,
    {
        EventStreamBuilder {
            source: self.source,
            config: self.config,
            transform: Transform::Sync(Box::new(f)),
        }
    }

    /// Apply an asynchronous transform to every item.
    ///
    /// The driver awaits each transformed item before yielding it, so output
    /// order always matches arrival order. Replaces any previously set
    /// transform.
    pub fn async_transform<T, F, Fut>(self, mut f: F) -> EventStreamBuilder<S, T>
    where
        F: FnMut(S::Payload) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        EventStreamBuilder {
            source: self.source,
            config: self.config,
            transform: Transform::Async(Box::new(move |payload| f(payload).boxed())),
        }
    }

    /// Validate, subscribe and return the stream.
    pub fn build(self) -> Result<EventStream<S, O>> {
        EventStream::new(self.source, self.config, self.transform)
    }
}
