//! event-hub-demo - wires a user registration flow onto the event bus.
//!
//! A producer publishes `user.created`; three handlers react to it (email
//! inline, analytics on its own task, a one-shot notification) while a
//! channel subscriber consumes the same topic as a stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

use event_hub::config::AppConfig;
use event_hub::domain::foundation::HandlerError;
use event_hub::telemetry::init_tracing;
use event_hub::{
    handler_fn, impl_event, listener_fn, BaseEvent, ChannelEventBus, EventBusError,
    EventPublisher, ListenerHandler, SharedEvent,
};

const USER_CREATED: &str = "user.created";

#[derive(Debug, Clone, Serialize)]
struct UserCreated {
    #[serde(flatten)]
    base: BaseEvent,
    user_id: u64,
    username: String,
    email: String,
}

impl_event!(UserCreated, base = base);

impl UserCreated {
    fn new(user_id: u64, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            base: BaseEvent::new(USER_CREATED),
            user_id,
            username: username.into(),
            email: email.into(),
        }
    }
}

/// Producer that only knows the publishing port.
struct UserRegistrationService {
    publisher: Arc<dyn EventPublisher>,
    next_id: AtomicU64,
}

impl UserRegistrationService {
    fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher,
            next_id: AtomicU64::new(1),
        }
    }

    async fn register(&self, username: &str, email: &str) -> Result<u64, EventBusError> {
        let user_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let event = UserCreated::new(user_id, username, email);
        info!(user_id, username, "User registered");
        self.publisher.publish(USER_CREATED, Arc::new(event)).await?;
        Ok(user_id)
    }
}

fn describe(event: &SharedEvent) -> String {
    match event.downcast_ref::<UserCreated>() {
        Some(user) => format!("{} <{}>", user.username, user.email),
        None => event.name().to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.logging)?;

    let bus = Arc::new(ChannelEventBus::new(config.bus.clone()));

    bus.subscribe(
        USER_CREATED,
        handler_fn("email", |event| async move {
            info!(recipient = %describe(&event), "Sending welcome email");
        }),
    )?;

    let analytics = ListenerHandler::new_shared(
        "analytics",
        listener_fn(|cancel, event: SharedEvent| async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(HandlerError::cancelled("analytics shut down")),
                _ = tokio::time::sleep(Duration::from_millis(50)) => {
                    let Some(user) = event.downcast_ref::<UserCreated>() else {
                        return Err(HandlerError::new("unexpected payload")
                            .with_detail("event", event.name()));
                    };
                    let payload = serde_json::to_string(user).map_err(|e| {
                        HandlerError::new(e.to_string())
                            .with_detail("user_id", user.user_id.to_string())
                    })?;
                    info!(%payload, "Recorded signup analytics");
                    Ok(())
                }
            }
        }),
    );
    bus.subscribe_async(USER_CREATED, analytics, false)?;

    bus.subscribe_once(
        USER_CREATED,
        handler_fn("first-user-notification", |event| async move {
            info!(user = %describe(&event), "First user signed up");
        }),
    )?;

    let subscriber = bus.subscribe_channel(USER_CREATED, 0)?;
    let mut events = subscriber.channel().into_stream();
    let consumer = tokio::spawn(async move {
        let mut received = 0usize;
        while let Some(event) = events.next().await {
            received += 1;
            info!(event_id = %event.id(), user = %describe(&event), "Channel consumer received event");
        }
        received
    });

    let service = UserRegistrationService::new(bus.clone());
    for (username, email) in [
        ("john", "john@example.com"),
        ("jane", "jane@example.com"),
        ("sam", "sam@example.com"),
    ] {
        service.register(username, email).await?;
    }

    bus.wait_async().await;
    info!(
        handlers = bus.handler_count(USER_CREATED),
        "Registrations processed"
    );

    bus.close().await?;
    match consumer.await {
        Ok(received) => info!(received, dropped = subscriber.dropped_count(), "Channel consumer finished"),
        Err(e) => warn!(error = %e, "Channel consumer task failed"),
    }

    Ok(())
}
