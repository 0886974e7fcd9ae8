//! Event Hub - In-process publish/subscribe event bus
//!
//! Handlers subscribe to string topics and are invoked synchronously or on
//! their own Tokio tasks when an event is published. A channel adapter
//! additionally fans events out into bounded per-subscriber queues.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;

pub use adapters::{ChannelEventBus, ChannelSubscriber, EventBus, HandlerOptions, SubscriptionId};
pub use domain::foundation::{BaseEvent, Event, EventBusError, EventId, SharedEvent, Timestamp};
pub use ports::{handler_fn, listener_fn, EventHandler, EventPublisher, Listener, ListenerHandler};
