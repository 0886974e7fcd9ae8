//! EventPublisher port - Interface for publishing events.
//!
//! Producers (services, controllers) depend on this port without knowing
//! whether the bus behind it also fans out to channel subscribers.

use async_trait::async_trait;

use crate::domain::foundation::{EventBusError, SharedEvent};

/// Port for publishing events on a topic.
///
/// Implementations must ensure:
/// - Topics without subscribers are not an error
/// - Synchronous handlers have run when `publish` returns
/// - Errors are propagated to the caller
///
/// # Example
///
/// ```ignore
/// let event = UserCreated::new(user.id, &user.username);
/// publisher.publish("user.created", Arc::new(event)).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to every handler of `topic`.
    async fn publish(&self, topic: &str, event: SharedEvent) -> Result<(), EventBusError>;

    /// Launch every handler of `topic` in the background and return at once.
    ///
    /// Silently does nothing once the bus is closed.
    fn publish_async(&self, topic: &str, event: SharedEvent);
}
