//! Error types for the event bus.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Lifecycle errors
    BusClosed,

    // Not found errors
    NotFound,

    // Cancellation errors
    ContextCancelled,

    // Handler errors
    HandlerFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::BusClosed => "BUS_CLOSED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ContextCancelled => "CONTEXT_CANCELLED",
            ErrorCode::HandlerFailed => "HANDLER_FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Errors reported synchronously by bus operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventBusError {
    #[error("eventbus is closed")]
    Closed,

    #[error("topic '{topic}' doesn't exist")]
    TopicNotFound { topic: String },

    #[error("handler not found for topic '{topic}'")]
    HandlerNotFound { topic: String },

    #[error("publish cancelled by caller")]
    Cancelled,
}

impl EventBusError {
    /// Creates a topic not found error.
    pub fn topic_not_found(topic: impl Into<String>) -> Self {
        EventBusError::TopicNotFound {
            topic: topic.into(),
        }
    }

    /// Creates a handler not found error.
    pub fn handler_not_found(topic: impl Into<String>) -> Self {
        EventBusError::HandlerNotFound {
            topic: topic.into(),
        }
    }

    /// Returns the error code category.
    pub fn code(&self) -> ErrorCode {
        match self {
            EventBusError::Closed => ErrorCode::BusClosed,
            EventBusError::TopicNotFound { .. } | EventBusError::HandlerNotFound { .. } => {
                ErrorCode::NotFound
            }
            EventBusError::Cancelled => ErrorCode::ContextCancelled,
        }
    }

    /// Checks whether this is either shape of "not found".
    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }
}

/// Failure reported by a listener.
///
/// The bus has no error channel for handlers: listener failures are logged
/// and go no further.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct HandlerError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl HandlerError {
    /// Creates a handler failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::HandlerFailed,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates an error for a listener that gave up because it was cancelled.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ContextCancelled,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_error_displays_correctly() {
        assert_eq!(EventBusError::Closed.to_string(), "eventbus is closed");
    }

    #[test]
    fn not_found_errors_name_the_topic() {
        let err = EventBusError::topic_not_found("user.created");
        assert_eq!(err.to_string(), "topic 'user.created' doesn't exist");

        let err = EventBusError::handler_not_found("user.created");
        assert_eq!(err.to_string(), "handler not found for topic 'user.created'");
    }

    #[test]
    fn both_not_found_shapes_share_a_code() {
        assert!(EventBusError::topic_not_found("a").is_not_found());
        assert!(EventBusError::handler_not_found("a").is_not_found());
        assert!(!EventBusError::Closed.is_not_found());
        assert_eq!(EventBusError::Cancelled.code(), ErrorCode::ContextCancelled);
    }

    #[test]
    fn handler_error_displays_code_and_message() {
        let err = HandlerError::new("smtp unavailable").with_detail("retry", "later");
        assert_eq!(err.to_string(), "[HANDLER_FAILED] smtp unavailable");
        assert_eq!(err.details.get("retry"), Some(&"later".to_string()));
    }

    #[test]
    fn cancelled_handler_error_uses_cancellation_code() {
        let err = HandlerError::cancelled("shutting down");
        assert_eq!(err.code, ErrorCode::ContextCancelled);
        assert_eq!(err.to_string(), "[CONTEXT_CANCELLED] shutting down");
    }

    #[test]
    fn error_code_display_formats_correctly() {
        assert_eq!(ErrorCode::BusClosed.to_string(), "BUS_CLOSED");
        assert_eq!(ErrorCode::NotFound.to_string(), "NOT_FOUND");
    }
}
