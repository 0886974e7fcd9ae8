//! Channel subscriber - bounded, drop-on-full queue of events for one topic.
//!
//! Consumers drain [`ChannelSubscriber::channel`] until it reports
//! disconnection, which happens once the subscriber is closed and the
//! buffered events have been read.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::foundation::SharedEvent;

/// Outcome of offering an event to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    Dropped,
    Closed,
}

/// Per-topic consumer queue owned by a [`ChannelEventBus`](super::ChannelEventBus).
///
/// # Example
///
/// ```ignore
/// let subscriber = channel_bus.subscribe_channel("user.created", 16)?;
/// let events = subscriber.channel();
///
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv_async().await {
///         // ...
///     }
///     // closed: stream ended
/// });
/// ```
pub struct ChannelSubscriber {
    topic: String,
    capacity: usize,
    sender: Mutex<Option<flume::Sender<SharedEvent>>>,
    receiver: flume::Receiver<SharedEvent>,
    cancel: CancellationToken,
    dropped: AtomicU64,
}

impl ChannelSubscriber {
    pub(crate) fn new(topic: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = flume::bounded(capacity);
        Self {
            topic: topic.into(),
            capacity,
            sender: Mutex::new(Some(sender)),
            receiver,
            cancel: CancellationToken::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Consumable stream of events for this subscriber.
    ///
    /// Receivers may be cloned and shared between consumers; each event is
    /// taken by exactly one of them. `recv`/`recv_async` report disconnection
    /// once the subscriber is closed and drained.
    pub fn channel(&self) -> flume::Receiver<SharedEvent> {
        self.receiver.clone()
    }

    /// Closes the subscriber. Idempotent.
    ///
    /// Cancels the lifetime token and closes the queue, so blocked consumers
    /// wake up once buffered events are drained.
    pub fn close(&self) {
        let mut sender = self.sender.lock();
        if sender.take().is_some() {
            self.cancel.cancel();
            debug!(
                topic = %self.topic,
                dropped = self.dropped_count(),
                "Channel subscriber closed"
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Lifetime token, cancelled when the subscriber closes.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Maximum number of undelivered events held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events currently buffered.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Events discarded because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Attempts a non-blocking send.
    ///
    /// The sender lock is held across the send so a concurrent `close`
    /// cannot slip an event in after the queue is closed.
    pub(crate) fn offer(&self, event: SharedEvent) -> Delivery {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Delivery::Closed;
        };

        match sender.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(flume::TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    topic = %self.topic,
                    event_id = %event.id(),
                    dropped,
                    "Channel subscriber full, event dropped"
                );
                Delivery::Dropped
            }
            Err(flume::TrySendError::Disconnected(_)) => Delivery::Closed,
        }
    }
}

impl fmt::Debug for ChannelSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSubscriber")
            .field("topic", &self.topic)
            .field("capacity", &self.capacity)
            .field("buffered", &self.len())
            .field("dropped", &self.dropped_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
