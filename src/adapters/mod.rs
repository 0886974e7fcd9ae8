//! Adapters - Implementations of port interfaces.
//!
//! - `events` - In-process event bus and its channel adapter

pub mod events;

pub use events::{ChannelEventBus, ChannelSubscriber, EventBus, HandlerOptions, SubscriptionId};
