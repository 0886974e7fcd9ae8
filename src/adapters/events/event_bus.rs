//! Topic-keyed event bus dispatching to registered handlers.
//!
//! Provides synchronous and asynchronous, once and repeating delivery.
//!
//! # Dispatch
//!
//! ```text
//! publish(topic, event)
//!          │
//!          ▼
//! ┌────────────────────┐
//! │ snapshot handlers  │  (read lock, released before dispatch)
//! └────────────────────┘
//!          │
//!     ┌────┴─────┐
//!     ▼          ▼
//!   sync       async
//!  inline    tokio task (bounded by semaphore, tracked by in-flight counter)
//!     │          │
//!     └────┬─────┘
//!          ▼
//!  once-handlers remove themselves by (topic, SubscriptionId)
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

use crate::config::BusConfig;
use crate::domain::foundation::{EventBusError, SharedEvent};
use crate::ports::{EventHandler, EventPublisher};

use super::in_flight::{InFlight, InFlightGuard};
use super::registry::{HandlerOptions, HandlerRegistry, Registration, SubscriptionId};

/// In-process publish/subscribe bus.
///
/// Cloning is cheap and every clone shares the same registry, so a bus can
/// be handed to handlers that subscribe or publish in turn.
///
/// # Example
///
/// ```ignore
/// let bus = EventBus::new(BusConfig::default());
///
/// bus.subscribe("user.created", handler_fn("mailer", |event| async move {
///     // ...
/// }))?;
///
/// bus.publish("user.created", Arc::new(UserCreated::new(1, "john"))).await?;
/// bus.close().await?;
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    config: BusConfig,
    registry: HandlerRegistry,
    in_flight: InFlight,
    workers: Arc<Semaphore>,
    closed: AtomicBool,
    /// Held shared while async work is admitted, exclusive while closing.
    gate: parking_lot::RwLock<()>,
    close_lock: tokio::sync::Mutex<()>,
}

impl EventBus {
    /// Creates a bus with the given configuration.
    pub fn new(config: BusConfig) -> Self {
        let permits = config.max_concurrent_handlers.max(1);
        Self {
            inner: Arc::new(Inner {
                config,
                registry: HandlerRegistry::new(),
                in_flight: InFlight::new(),
                workers: Arc::new(Semaphore::new(permits)),
                closed: AtomicBool::new(false),
                gate: parking_lot::RwLock::new(()),
                close_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Configuration this bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    // === Subscription ===

    /// Registers a synchronous, repeating handler.
    pub fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionId, EventBusError> {
        self.register(topic, handler, HandlerOptions::SYNC)
    }

    /// Registers a synchronous handler removed after its first invocation.
    pub fn subscribe_once(
        &self,
        topic: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionId, EventBusError> {
        self.register(topic, handler, HandlerOptions::SYNC_ONCE)
    }

    /// Registers a handler run on its own task for every publish.
    ///
    /// A transactional registration never runs concurrently with itself.
    pub fn subscribe_async(
        &self,
        topic: &str,
        handler: Arc<dyn EventHandler>,
        transactional: bool,
    ) -> Result<SubscriptionId, EventBusError> {
        self.register(topic, handler, HandlerOptions::asynchronous(transactional))
    }

    /// Registers an asynchronous handler removed after its first invocation.
    pub fn subscribe_once_async(
        &self,
        topic: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionId, EventBusError> {
        self.register(topic, handler, HandlerOptions::ASYNC_ONCE)
    }

    fn register(
        &self,
        topic: &str,
        handler: Arc<dyn EventHandler>,
        options: HandlerOptions,
    ) -> Result<SubscriptionId, EventBusError> {
        self.ensure_open()?;

        let handler_name = handler.name().to_string();
        let id = self.inner.registry.insert(topic, handler, options);

        debug!(
            topic,
            subscription_id = %id,
            handler = %handler_name,
            once = options.once,
            is_async = options.is_async,
            transactional = options.transactional,
            "Registered event handler"
        );

        Ok(id)
    }

    /// Removes the registration identified by `id` from `topic`.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<(), EventBusError> {
        self.ensure_open()?;
        let removed = self.inner.registry.remove(topic, id)?;
        debug!(topic, subscription_id = %removed.id, "Unregistered event handler");
        Ok(())
    }

    /// Removes the first registration of `handler` on `topic`.
    ///
    /// Handlers are matched by `Arc` identity, not by value.
    pub fn unsubscribe_handler(
        &self,
        topic: &str,
        handler: &Arc<dyn EventHandler>,
    ) -> Result<(), EventBusError> {
        self.ensure_open()?;
        let removed = self.inner.registry.remove_handler(topic, handler)?;
        debug!(topic, subscription_id = %removed.id, "Unregistered event handler");
        Ok(())
    }

    // === Publishing ===

    /// Invokes every handler of `topic` in registration order.
    ///
    /// Synchronous handlers have returned when this resolves; asynchronous
    /// ones are launched and tracked but not awaited. Launched tasks queue
    /// for a worker permit, so a handler may publish back into the bus.
    pub async fn publish(&self, topic: &str, event: SharedEvent) -> Result<(), EventBusError> {
        self.ensure_open()?;

        let registrations = self.inner.registry.snapshot(topic);
        if registrations.is_empty() {
            trace!(topic, event_id = %event.id(), "No handlers for topic");
            return Ok(());
        }

        trace!(
            topic,
            event_id = %event.id(),
            handlers = registrations.len(),
            "Publishing event"
        );

        for registration in registrations {
            if registration.options.is_async {
                self.launch(topic, registration, event.clone());
            } else {
                self.inner.invoke(topic, &registration, event.clone()).await;
            }
        }

        Ok(())
    }

    /// Launches every handler of `topic`, sync or not, on its own task.
    ///
    /// Returns immediately; a closed bus makes this a no-op. Launched tasks
    /// queue for a worker permit rather than blocking the caller.
    pub fn publish_async(&self, topic: &str, event: SharedEvent) {
        if self.is_closed() {
            trace!(topic, "Bus closed, dropping async publish");
            return;
        }

        let registrations = self.inner.registry.snapshot(topic);
        trace!(
            topic,
            event_id = %event.id(),
            handlers = registrations.len(),
            "Publishing event asynchronously"
        );

        for registration in registrations {
            self.launch(topic, registration, event.clone());
        }
    }

    fn launch(
        &self,
        topic: &str,
        registration: Arc<Registration>,
        event: SharedEvent,
    ) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                topic,
                handler = registration.handler.name(),
                "No Tokio runtime available, async handler not launched"
            );
            return;
        };

        let Some(guard) = self.track() else {
            trace!(topic, "Bus closed during publish, async handler not launched");
            return;
        };
        let inner = Arc::clone(&self.inner);
        let topic = topic.to_string();

        runtime.spawn(async move {
            let _guard: InFlightGuard = guard;
            let Ok(_permit) = Arc::clone(&inner.workers).acquire_owned().await else {
                return;
            };
            inner.invoke(&topic, &registration, event).await;
        });
    }

    // === Introspection ===

    /// Checks whether at least one handler is registered for `topic`.
    pub fn has_callback(&self, topic: &str) -> bool {
        self.inner.registry.has_handlers(topic)
    }

    /// Number of registrations on `topic`.
    pub fn handler_count(&self, topic: &str) -> usize {
        self.inner.registry.handler_count(topic)
    }

    /// Topics with at least one registration.
    pub fn topics(&self) -> Vec<String> {
        self.inner.registry.topics()
    }

    /// Number of asynchronous invocations launched and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.count()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    // === Lifecycle ===

    /// Waits until every asynchronous invocation launched so far has finished.
    pub async fn wait_async(&self) {
        self.inner.in_flight.wait().await;
    }

    /// Closes the bus.
    ///
    /// Idempotent. Marks the bus closed, waits for outstanding async work,
    /// then drops every registration. A concurrent second call waits for the
    /// first to finish.
    pub async fn close(&self) -> Result<(), EventBusError> {
        let _closing = self.inner.close_lock.lock().await;
        {
            let _gate = self.inner.gate.write();
            if self.inner.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
        }

        debug!(in_flight = self.in_flight(), "Closing event bus, draining async handlers");
        self.wait_async().await;

        let removed = self.inner.registry.clear();
        debug!(removed, "Event bus closed");
        Ok(())
    }

    /// Registers one unit of background work with the in-flight counter.
    ///
    /// Returns `None` once the bus is closed, so nothing is admitted after
    /// `close` has started draining.
    pub(crate) fn track(&self) -> Option<InFlightGuard> {
        let _gate = self.inner.gate.read();
        if self.is_closed() {
            None
        } else {
            Some(self.inner.in_flight.start())
        }
    }

    fn ensure_open(&self) -> Result<(), EventBusError> {
        if self.is_closed() {
            Err(EventBusError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Inner {
    async fn invoke(&self, topic: &str, registration: &Registration, event: SharedEvent) {
        if !registration.claim() {
            trace!(topic, subscription_id = %registration.id, "Once-handler already fired, skipping");
            return;
        }

        trace!(
            topic,
            subscription_id = %registration.id,
            handler = registration.handler.name(),
            event_id = %event.id(),
            waited_ms = event.timestamp().elapsed().num_milliseconds(),
            "Invoking handler"
        );

        {
            let _serial = registration.serial_guard().await;
            registration.handler.handle(event).await;
        }

        if registration.options.once {
            // Already gone if it was unsubscribed or the bus was closed meanwhile
            if self.registry.remove(topic, registration.id).is_ok() {
                debug!(topic, subscription_id = %registration.id, "Once-handler removed after firing");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.topics().len())
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, topic: &str, event: SharedEvent) -> Result<(), EventBusError> {
        EventBus::publish(self, topic, event).await
    }

    fn publish_async(&self, topic: &str, event: SharedEvent) {
        EventBus::publish_async(self, topic, event)
    }
}
