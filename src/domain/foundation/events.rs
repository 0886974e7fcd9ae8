//! Event infrastructure for publishing and handling.
//!
//! This module provides the core types every publisher and subscriber shares:
//! - `Event` - Capability set (name, id, timestamp) the bus routes on
//! - `EventId` - Unique identifier for an event instance
//! - `BaseEvent` - Base structure concrete event payloads embed
//! - `impl_event!` - Macro implementing `Event` by delegating to an embedded `BaseEvent`
//!
//! The bus never looks past the base capability. Handlers recover their
//! concrete payload with [`downcast_ref`](trait.Event.html#method.downcast_ref).

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::Timestamp;

// ============================================
// Event Trait
// ============================================

/// Capability set shared by every event flowing through the bus.
///
/// Implementations are immutable once constructed. The `name` doubles as the
/// topic the event is routed on by the channel adapter.
///
/// Use the `impl_event!` macro for payload structs that embed a [`BaseEvent`].
pub trait Event: Send + Sync + fmt::Debug + 'static {
    /// Topic name (e.g., "user.created").
    fn name(&self) -> &str;

    /// Unique ID for this event instance.
    fn id(&self) -> &EventId;

    /// When the event was constructed.
    fn timestamp(&self) -> Timestamp;

    /// Upcast used for payload downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl dyn Event {
    /// Returns the concrete payload if this event is a `T`.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Checks whether this event is a `T`.
    pub fn is<T: Event>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Shared, type-erased event handed to handlers and channel subscribers.
pub type SharedEvent = Arc<dyn Event>;

/// Macro to implement `Event` for a payload embedding a `BaseEvent`.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// pub struct UserCreated {
///     pub base: BaseEvent,
///     pub user_id: u64,
///     pub username: String,
/// }
///
/// impl_event!(UserCreated, base = base);
/// ```
#[macro_export]
macro_rules! impl_event {
    ($event_name:ident, base = $base_field:ident) => {
        impl $crate::domain::foundation::Event for $event_name {
            fn name(&self) -> &str {
                $crate::domain::foundation::Event::name(&self.$base_field)
            }

            fn id(&self) -> &$crate::domain::foundation::EventId {
                $crate::domain::foundation::Event::id(&self.$base_field)
            }

            fn timestamp(&self) -> $crate::domain::foundation::Timestamp {
                $crate::domain::foundation::Event::timestamp(&self.$base_field)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };
}

// Re-export the macro
pub use impl_event;

// ============================================
// EventId
// ============================================

/// Unique identifier for events.
///
/// Generated from a UUID v4, so two events constructed in the same instant
/// still get distinct IDs. Collisions from caller-supplied IDs are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates an EventId from an existing string.
    ///
    /// No validation is performed - any string is accepted.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================
// BaseEvent
// ============================================

/// Base structure concrete events embed.
///
/// Fields are private: an event is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEvent {
    name: String,
    id: EventId,
    timestamp: Timestamp,
}

impl BaseEvent {
    /// Creates a base event for `name` with a fresh ID and the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: EventId::new(),
            timestamp: Timestamp::now(),
        }
    }

    /// Creates a base event with a caller-chosen ID.
    pub fn with_id(name: impl Into<String>, id: EventId) -> Self {
        Self {
            name: name.into(),
            id,
            timestamp: Timestamp::now(),
        }
    }

    /// Wraps this event for publishing.
    pub fn shared(self) -> SharedEvent {
        Arc::new(self)
    }
}

impl Event for BaseEvent {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &EventId {
        &self.id
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, Serialize)]
    struct UserCreated {
        #[serde(flatten)]
        base: BaseEvent,
        user_id: u64,
        username: String,
    }

    impl_event!(UserCreated, base = base);

    fn user_created(user_id: u64) -> UserCreated {
        UserCreated {
            base: BaseEvent::new("user.created"),
            user_id,
            username: "john_doe".to_string(),
        }
    }

    #[test]
    fn event_id_new_generates_unique_ids() {
        let ids: HashSet<EventId> = (0..1000).map(|_| EventId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn event_id_from_string_preserves_value() {
        let id = EventId::from_string("evt-42");
        assert_eq!(id.as_str(), "evt-42");
        assert_eq!(id.to_string(), "evt-42");
    }

    #[test]
    fn base_event_assigns_name_id_and_timestamp() {
        let before = Timestamp::now();
        let event = BaseEvent::new("order.placed");

        assert_eq!(event.name(), "order.placed");
        assert!(!event.id().as_str().is_empty());
        assert!(!event.timestamp().is_before(&before));
    }

    #[test]
    fn macro_delegates_base_capability() {
        let event = user_created(1);

        assert_eq!(Event::name(&event), "user.created");
        assert_eq!(Event::id(&event), event.base.id());
        assert_eq!(Event::timestamp(&event), event.base.timestamp());
    }

    #[test]
    fn shared_event_downcasts_to_concrete_payload() {
        let shared: SharedEvent = Arc::new(user_created(7));

        assert!(shared.is::<UserCreated>());
        assert!(!shared.is::<BaseEvent>());

        let payload = shared.downcast_ref::<UserCreated>().unwrap();
        assert_eq!(payload.user_id, 7);
        assert_eq!(payload.username, "john_doe");
    }

    #[test]
    fn payload_serializes_with_flattened_base() {
        let event = user_created(3);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["name"], "user.created");
        assert_eq!(json["user_id"], 3);
        assert!(json["id"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn base_event_roundtrips_through_json() {
        let event = BaseEvent::with_id("x", EventId::from_string("fixed"));
        let json = serde_json::to_string(&event).unwrap();
        let back: BaseEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
