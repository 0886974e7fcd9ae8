//! Ports - Interfaces between the bus and its collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the bus and the code that produces or consumes events. Adapters implement
//! these ports.
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port producers depend on to publish events
//! - `EventHandler` - Handler invoked for events on a subscribed topic
//! - `Listener` - Named, fallible callback usable in place of a raw handler

mod event_handler;
mod event_publisher;
mod listener;

pub use event_handler::{handler_fn, EventHandler, FnHandler};
pub use event_publisher::EventPublisher;
pub use listener::{listener_fn, Listener, ListenerFn, ListenerHandler};
