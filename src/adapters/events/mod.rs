//! Event bus adapters.
//!
//! - `EventBus` - In-process bus dispatching to registered handlers
//! - `ChannelEventBus` - `EventBus` plus bounded per-topic channel subscribers
//! - `ChannelSubscriber` - Consumer side of a channel subscription

mod channel_bus;
mod channel_subscriber;
mod event_bus;
mod in_flight;
mod registry;

pub use channel_bus::ChannelEventBus;
pub use channel_subscriber::ChannelSubscriber;
pub use event_bus::EventBus;
pub use registry::{HandlerOptions, SubscriptionId};
