//! Error types for the event-stream crate.

use std::fmt;
use std::time::Duration;

/// Errors raised while building a stream, before any subscription is made.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The source already finished before the stream could attach to it
    #[error(
        "Event source has already finished (readable ended: {readable_ended}, writable ended: {writable_ended})"
    )]
    InvalidSourceState {
        /// Whether the source reported its readable side as ended
        readable_ended: bool,
        /// Whether the source reported its writable side as ended
        writable_ended: bool,
    },

    /// An event name was empty
    #[error("Event name for {field} must not be empty")]
    EmptyEventName {
        /// The configuration field holding the empty name
        field: &'static str,
    },

    /// The list of end events was empty
    #[error("At least one end event must be configured")]
    NoEndEvents,

    /// The same end event was listed twice
    #[error("End event listed more than once: {0}")]
    DuplicateEndEvent(String),

    /// One event name was configured for more than one role
    #[error("Event name configured for more than one role: {0}")]
    ConflictingEventName(String),

    /// A numeric setting was out of range
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The options record could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which deadline expired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutPhase {
    /// No item arrived within the first-item timeout
    FirstItem,
    /// No further item arrived within the between-items timeout
    BetweenItems,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::FirstItem => write!(f, "first item"),
            TimeoutPhase::BetweenItems => write!(f, "next item"),
        }
    }
}

/// Terminal failure of an event stream.
///
/// `E` is the payload type of the source; a source error carries the payload
/// the source emitted on its error event.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError<E> {
    /// The source emitted its error event
    #[error("Event source reported an error: {0:?}")]
    Source(E),

    /// No item arrived before the active deadline
    #[error("Timed out after {timeout:?} waiting for the {phase}")]
    Timeout {
        /// The phase whose deadline expired
        phase: TimeoutPhase,
        /// The configured timeout for that phase
        timeout: Duration,
    },
}

impl<E> StreamError<E> {
    /// Whether this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, StreamError::Timeout { .. })
    }

    /// Whether this error came from the source itself
    pub fn is_source(&self) -> bool {
        matches!(self, StreamError::Source(_))
    }

    /// The expired phase, if this is a timeout
    pub fn timeout_phase(&self) -> Option<TimeoutPhase> {
        match self {
            StreamError::Timeout { phase, .. } => Some(*phase),
            StreamError::Source(_) => None,
        }
    }

    /// The source's error payload, if this is a source error
    pub fn into_source(self) -> Option<E> {
        match self {
            StreamError::Source(error) => Some(error),
            StreamError::Timeout { .. } => None,
        }
    }
}

/// Convenience type alias for Results using ConfigurationError.
pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let error = ConfigurationError::InvalidSourceState {
            readable_ended: true,
            writable_ended: false,
        };
        assert_eq!(
            error.to_string(),
            "Event source has already finished (readable ended: true, writable ended: false)"
        );

        let error = ConfigurationError::EmptyEventName { field: "itemEvent" };
        assert_eq!(error.to_string(), "Event name for itemEvent must not be empty");

        let error = ConfigurationError::DuplicateEndEvent("end".to_string());
        assert_eq!(error.to_string(), "End event listed more than once: end");

        let error = ConfigurationError::ConflictingEventName("data".to_string());
        assert_eq!(
            error.to_string(),
            "Event name configured for more than one role: data"
        );

        let error = ConfigurationError::InvalidValue("limit must be greater than 0".to_string());
        assert_eq!(error.to_string(), "Invalid value: limit must be greater than 0");
    }

    #[test]
    fn test_parse_error_conversion() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: ConfigurationError = parse_error.into();

        match error {
            ConfigurationError::Parse(e) => assert!(e.is_eof()),
            _ => panic!("Expected Parse variant"),
        }
    }

    #[test]
    fn test_stream_error_display() {
        let error: StreamError<&str> = StreamError::Source("boom");
        assert_eq!(error.to_string(), "Event source reported an error: \"boom\"");

        let error: StreamError<&str> = StreamError::Timeout {
            phase: TimeoutPhase::FirstItem,
            timeout: Duration::from_millis(250),
        };
        assert_eq!(error.to_string(), "Timed out after 250ms waiting for the first item");

        let error: StreamError<&str> = StreamError::Timeout {
            phase: TimeoutPhase::BetweenItems,
            timeout: Duration::from_secs(2),
        };
        assert_eq!(error.to_string(), "Timed out after 2s waiting for the next item");
    }

    #[test]
    fn test_stream_error_helpers() {
        let source: StreamError<u8> = StreamError::Source(7);
        assert!(source.is_source());
        assert!(!source.is_timeout());
        assert_eq!(source.timeout_phase(), None);
        assert_eq!(source.into_source(), Some(7));

        let timeout: StreamError<u8> = StreamError::Timeout {
            phase: TimeoutPhase::BetweenItems,
            timeout: Duration::from_millis(10),
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.timeout_phase(), Some(TimeoutPhase::BetweenItems));
        assert_eq!(timeout.into_source(), None);
    }
}
