//! Foundation module - Shared event primitives.
//!
//! Contains the event capability, identifiers, timestamps and error types
//! that form the vocabulary of the event bus.

mod errors;
mod events;
mod timestamp;

pub use errors::{ErrorCode, EventBusError, HandlerError};
pub use events::{impl_event, BaseEvent, Event, EventId, SharedEvent};
pub use timestamp::Timestamp;
