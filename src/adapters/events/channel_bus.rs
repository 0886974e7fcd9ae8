//! Channel adapter - fans topic events out into per-subscriber queues.
//!
//! Wraps an [`EventBus`] by composition: every bus operation it does not
//! override is reached through `Deref`. Channel subscribers live in a table
//! of their own, independent of the handler registry.
//!
//! # Delivery policy
//!
//! Sends never block the publisher. A full queue drops the event for that
//! subscriber (counted, logged at `debug`, never reported to the caller),
//! and a closed subscriber is skipped.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::BusConfig;
use crate::domain::foundation::{EventBusError, SharedEvent};
use crate::ports::EventPublisher;

use super::channel_subscriber::{ChannelSubscriber, Delivery};
use super::EventBus;

/// Channel subscribers by topic.
///
/// `closed` is only flipped under the write lock, so a subscriber is either
/// inserted before `close` empties the table or refused.
#[derive(Default)]
struct SubscriberTable {
    topics: HashMap<String, Vec<Arc<ChannelSubscriber>>>,
    closed: bool,
}

/// Event bus that additionally delivers events to channel subscribers.
pub struct ChannelEventBus {
    bus: EventBus,
    subscribers: RwLock<SubscriberTable>,
}

impl ChannelEventBus {
    /// Creates an adapter over a fresh bus.
    pub fn new(config: BusConfig) -> Self {
        Self::with_bus(EventBus::new(config))
    }

    /// Creates an adapter over an existing bus.
    pub fn with_bus(bus: EventBus) -> Self {
        Self {
            bus,
            subscribers: RwLock::new(SubscriberTable::default()),
        }
    }

    /// Create as Arc for sharing
    pub fn new_shared(config: BusConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// The wrapped bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // === Channel subscriptions ===

    /// Creates a subscriber on `topic` with a queue of `buffer_size` events.
    ///
    /// A zero size falls back to the configured default buffer size.
    pub fn subscribe_channel(
        &self,
        topic: &str,
        buffer_size: usize,
    ) -> Result<Arc<ChannelSubscriber>, EventBusError> {
        let capacity = self.bus.config().buffer_size_or_default(buffer_size);
        let subscriber = Arc::new(ChannelSubscriber::new(topic, capacity));

        {
            let mut table = self.subscribers.write();
            if table.closed || self.bus.is_closed() {
                return Err(EventBusError::Closed);
            }
            table
                .topics
                .entry(topic.to_string())
                .or_default()
                .push(Arc::clone(&subscriber));
        }

        debug!(topic, capacity, "Registered channel subscriber");
        Ok(subscriber)
    }

    /// Removes `subscriber` from `topic` and closes it.
    ///
    /// Returns whether the subscriber was registered on `topic`.
    pub fn unsubscribe_channel(&self, topic: &str, subscriber: &Arc<ChannelSubscriber>) -> bool {
        let removed = {
            let mut table = self.subscribers.write();
            let Some(subscribers) = table.topics.get_mut(topic) else {
                return false;
            };
            let Some(index) = subscribers.iter().position(|s| Arc::ptr_eq(s, subscriber)) else {
                return false;
            };
            let removed = subscribers.remove(index);
            if subscribers.is_empty() {
                table.topics.remove(topic);
            }
            removed
        };

        removed.close();
        debug!(topic, "Unregistered channel subscriber");
        true
    }

    /// Number of channel subscribers on `topic`.
    pub fn channel_subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.read().topics.get(topic).map_or(0, Vec::len)
    }

    /// Checks whether the adapter or its bus has been closed.
    pub fn is_closed(&self) -> bool {
        self.subscribers.read().closed || self.bus.is_closed()
    }

    fn snapshot(&self, topic: &str) -> Vec<Arc<ChannelSubscriber>> {
        self.subscribers
            .read()
            .topics
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    // === Channel publishing ===

    /// Offers `event` to every channel subscriber of `event.name()`.
    ///
    /// `cancel` is checked before each subscriber; once it fires the
    /// remaining subscribers are skipped and `Cancelled` is returned.
    pub fn publish_event(
        &self,
        cancel: &CancellationToken,
        event: SharedEvent,
    ) -> Result<(), EventBusError> {
        if self.is_closed() {
            return Err(EventBusError::Closed);
        }

        let subscribers = self.snapshot(event.name());
        for subscriber in subscribers {
            if cancel.is_cancelled() {
                return Err(EventBusError::Cancelled);
            }
            if subscriber.is_cancelled() {
                continue;
            }
            subscriber.offer(event.clone());
        }

        Ok(())
    }

    /// Offers `event` to every channel subscriber, one task per subscriber.
    ///
    /// Returns immediately. Each task gives up if `cancel` or the
    /// subscriber's own token has fired by the time it runs.
    pub fn publish_event_async(&self, cancel: &CancellationToken, event: SharedEvent) {
        if self.is_closed() {
            return;
        }

        let subscribers = self.snapshot(event.name());
        if subscribers.is_empty() {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(
                topic = event.name(),
                "No Tokio runtime available, channel delivery skipped"
            );
            return;
        };

        for subscriber in subscribers {
            let Some(guard) = self.bus.track() else {
                return;
            };
            let cancel = cancel.clone();
            let event = event.clone();
            runtime.spawn(async move {
                let _guard = guard;
                if cancel.is_cancelled() || subscriber.is_cancelled() {
                    return;
                }
                if subscriber.offer(event) == Delivery::Closed {
                    trace!(topic = subscriber.topic(), "Channel subscriber closed before delivery");
                }
            });
        }
    }

    // === Overridden bus operations ===

    /// Publishes to the handlers of `topic`, then to its channel subscribers.
    pub async fn publish(&self, topic: &str, event: SharedEvent) -> Result<(), EventBusError> {
        if self.is_closed() {
            return Err(EventBusError::Closed);
        }
        self.bus.publish(topic, event.clone()).await?;
        for subscriber in self.snapshot(topic) {
            if !subscriber.is_cancelled() {
                subscriber.offer(event.clone());
            }
        }
        Ok(())
    }

    /// Fire-and-forget publish to the handlers and channel subscribers of `topic`.
    pub fn publish_async(&self, topic: &str, event: SharedEvent) {
        if self.is_closed() {
            return;
        }
        self.bus.publish_async(topic, event.clone());
        for subscriber in self.snapshot(topic) {
            if !subscriber.is_cancelled() {
                subscriber.offer(event.clone());
            }
        }
    }

    /// Closes every channel subscriber, clears the table, then closes the bus.
    ///
    /// Subscriptions attempted once this has started are refused.
    pub async fn close(&self) -> Result<(), EventBusError> {
        let topics = {
            let mut table = self.subscribers.write();
            table.closed = true;
            std::mem::take(&mut table.topics)
        };
        let closed: usize = topics
            .values()
            .flatten()
            .map(|subscriber| subscriber.close())
            .count();
        if closed > 0 {
            debug!(closed, "Closed channel subscribers");
        }

        self.bus.close().await
    }
}

impl Deref for ChannelEventBus {
    type Target = EventBus;

    fn deref(&self) -> &EventBus {
        &self.bus
    }
}

impl Default for ChannelEventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl fmt::Debug for ChannelEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers: usize = self.subscribers.read().topics.values().map(Vec::len).sum();
        f.debug_struct("ChannelEventBus")
            .field("bus", &self.bus)
            .field("channel_subscribers", &subscribers)
            .finish()
    }
}

#[async_trait]
impl EventPublisher for ChannelEventBus {
    async fn publish(&self, topic: &str, event: SharedEvent) -> Result<(), EventBusError> {
        ChannelEventBus::publish(self, topic, event).await
    }

    fn publish_async(&self, topic: &str, event: SharedEvent) {
        ChannelEventBus::publish_async(self, topic, event)
    }
}
