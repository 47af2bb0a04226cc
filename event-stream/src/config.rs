//! Configuration types for the event-stream crate
//!
//! `StreamConfig` is the options record of a stream: which notifications carry
//! items, errors and completion, the two optional deadlines, the item limit
//! and the keep-alive cadence. User-supplied fields are merged over the
//! defaults, either through the `with_*` methods or by deserializing a partial
//! JSON record.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};

/// Default name of the item notification
pub const DEFAULT_ITEM_EVENT: &str = "data";

/// Default name of the error notification
pub const DEFAULT_ERROR_EVENT: &str = "error";

/// Default names of the completion notifications
pub const DEFAULT_END_EVENTS: [&str; 2] = ["close", "end"];

/// Default keep-alive interval
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(1000);

/// Configuration for an EventStream
///
/// Durations serialize as whole milliseconds and field names are camelCase:
///
/// ```json
/// { "event": "checkout", "endEvents": ["close"], "firstItemTimeout": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StreamConfig {
    /// Notification carrying item payloads
    /// Default: "data"
    #[serde(alias = "event")]
    pub item_event: String,

    /// Notification carrying a source error
    /// Default: "error"
    pub error_event: String,

    /// Notifications signalling natural completion; any one of them ends the stream
    /// Default: ["close", "end"]
    pub end_events: Vec<String>,

    /// Deadline for the first item, measured from construction
    /// Default: none (wait indefinitely)
    #[serde(with = "duration_ms::option")]
    pub first_item_timeout: Option<Duration>,

    /// Deadline between consecutive items, measured from the last consumed item
    /// Default: none (wait indefinitely)
    #[serde(with = "duration_ms::option")]
    pub between_items_timeout: Option<Duration>,

    /// Maximum number of items to yield
    /// Default: none (unlimited)
    pub limit: Option<usize>,

    /// Interval of the keep-alive task used while some phase is untimed
    /// Default: 1000 ms
    #[serde(with = "duration_ms")]
    pub keep_alive_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            item_event: DEFAULT_ITEM_EVENT.to_string(),
            error_event: DEFAULT_ERROR_EVENT.to_string(),
            end_events: DEFAULT_END_EVENTS.iter().map(|e| e.to_string()).collect(),
            first_item_timeout: None,
            between_items_timeout: None,
            limit: None,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
        }
    }
}

impl StreamConfig {
    /// Create a new StreamConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a StreamConfig with both deadlines set
    pub fn timed(first_item: Duration, between_items: Duration) -> Self {
        Self {
            first_item_timeout: Some(first_item),
            between_items_timeout: Some(between_items),
            ..Default::default()
        }
    }

    /// Parse a partial JSON options record, merge it over the defaults and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether at least one phase waits without a deadline
    pub fn needs_keep_alive(&self) -> bool {
        self.first_item_timeout.is_none() || self.between_items_timeout.is_none()
    }

    /// Validate the configuration and return the first issue found
    pub fn validate(&self) -> Result<()> {
        if self.item_event.is_empty() {
            return Err(ConfigurationError::EmptyEventName { field: "itemEvent" });
        }

        if self.error_event.is_empty() {
            return Err(ConfigurationError::EmptyEventName { field: "errorEvent" });
        }

        if self.end_events.is_empty() {
            return Err(ConfigurationError::NoEndEvents);
        }

        let mut seen = HashSet::new();
        for name in &self.end_events {
            if name.is_empty() {
                return Err(ConfigurationError::EmptyEventName { field: "endEvents" });
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigurationError::DuplicateEndEvent(name.clone()));
            }
        }

        if self.item_event == self.error_event || seen.contains(self.item_event.as_str()) {
            return Err(ConfigurationError::ConflictingEventName(self.item_event.clone()));
        }

        if seen.contains(self.error_event.as_str()) {
            return Err(ConfigurationError::ConflictingEventName(self.error_event.clone()));
        }

        if self.first_item_timeout == Some(Duration::ZERO) {
            return Err(ConfigurationError::InvalidValue(
                "first item timeout must be greater than 0".to_string(),
            ));
        }

        if self.between_items_timeout == Some(Duration::ZERO) {
            return Err(ConfigurationError::InvalidValue(
                "between items timeout must be greater than 0".to_string(),
            ));
        }

        if self.limit == Some(0) {
            return Err(ConfigurationError::InvalidValue(
                "limit must be greater than 0".to_string(),
            ));
        }

        if self.keep_alive_interval == Duration::ZERO {
            return Err(ConfigurationError::InvalidValue(
                "keep-alive interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_item_event(mut self, event: impl Into<String>) -> Self {
        self.item_event = event.into();
        self
    }

    pub fn with_error_event(mut self, event: impl Into<String>) -> Self {
        self.error_event = event.into();
        self
    }

    pub fn with_end_events<I, E>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<String>,
    {
        self.end_events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_first_item_timeout(mut self, timeout: Duration) -> Self {
        self.first_item_timeout = Some(timeout);
        self
    }

    pub fn with_between_items_timeout(mut self, timeout: Duration) -> Self {
        self.between_items_timeout = Some(timeout);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }
}

/// Durations as whole milliseconds
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    fn to_millis(duration: &Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(to_millis(duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(d) => serializer.serialize_some(&super::to_millis(d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
        }
    }
}
