//! # event-stream
//!
//! Adapts a push-based event source into a pull-based, ordered stream.
//!
//! A source fires named notifications (items, an error, one of several end
//! signals) whenever it likes. An [`EventStream`] subscribes to them, buffers
//! items in arrival order and hands them out one pull at a time, optionally
//! through a sync or async transform.
//!
//! ## Key Features
//!
//! - **Ordered delivery**: items are yielded in strict arrival order; items
//!   buffered before an error or end are delivered before the terminal outcome
//! - **Deadlines**: separate timeouts for the first item and between items,
//!   switching from one to the other after the first item
//! - **Limits**: stop successfully after a given number of items
//! - **Scoped subscriptions**: detaching removes only this stream's listeners,
//!   exactly once, on every terminal path (including drop)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use event_source::EventEmitter;
//! use event_stream::{from_events, StreamConfig};
//! use std::time::Duration;
//!
//! let emitter = EventEmitter::<serde_json::Value>::new();
//! let config = StreamConfig::new()
//!     .with_item_event("checkout")
//!     .with_between_items_timeout(Duration::from_secs(5));
//!
//! let mut stream = from_events(emitter.clone(), config)?;
//!
//! while let Some(item) = stream.next_async().await {
//!     println!("{:?}", item?);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! source ──on/once──▶ Bridge (FIFO buffer, active, pending error)
//!                        │ Notify
//!                        ▼
//! consumer ◀── EventStream::next_async ── drain buffer, else
//!                        │                RaceSelector::race(signal, deadline)
//!                        └── KeepAlive (only while some phase is untimed)
//! ```

pub mod bridge;
pub mod builder;
pub mod config;
pub mod deadline;
pub mod error;
pub mod keep_alive;
pub mod race;
pub mod stream;

use event_source::EventSource;

pub use builder::EventStreamBuilder;
pub use config::StreamConfig;
pub use error::{ConfigurationError, Result, StreamError, TimeoutPhase};
pub use stream::{EventStream, StreamStats};

// Re-export the source contract so consumers need a single import
pub use event_source::{EventEmitter, Handler, ListenerId};

/// Bridge `source` into a stream yielding its payloads unchanged.
///
/// Each call builds a fresh, independent stream with its own subscriptions.
pub fn from_events<S: EventSource>(
    source: S,
    config: StreamConfig,
) -> Result<EventStream<S, S::Payload>> {
    EventStreamBuilder::new(source).config(config).build()
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        from_events, ConfigurationError, EventEmitter, EventStream, EventStreamBuilder,
        StreamConfig, StreamError, StreamStats, TimeoutPhase,
    };
    pub use event_source::EventSource;
}
