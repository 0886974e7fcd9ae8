//! EventHandler port - Callback invoked for events on a subscribed topic.
//!
//! Handlers are typed values: a registration can only ever hold something
//! that accepts a [`SharedEvent`], so a mismatched callback shape is rejected
//! by the compiler instead of failing at publish time.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::domain::foundation::SharedEvent;

/// Handler for events published on a topic.
///
/// Implementations should be:
/// - **Quick** when registered synchronously - the publisher waits for them
/// - **Self-contained** - there is no error channel back to the publisher
///
/// # Example
///
/// ```ignore
/// struct WelcomeMailer { /* ... */ }
///
/// #[async_trait]
/// impl EventHandler for WelcomeMailer {
///     async fn handle(&self, event: SharedEvent) {
///         if let Some(user) = event.downcast_ref::<UserCreated>() {
///             // send the mail...
///         }
///     }
///
///     fn name(&self) -> &str {
///         "WelcomeMailer"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process an event.
    async fn handle(&self, event: SharedEvent);

    /// Handler name for logging.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Handler built from an async closure.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F> {
    /// Wraps `f` under the given handler name.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(SharedEvent) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn handle(&self, event: SharedEvent) {
        (self.f)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Creates a shareable handler from an async closure.
///
/// Keep a clone of the returned `Arc` to unsubscribe by handler identity later.
///
/// ```ignore
/// let handler: Arc<dyn EventHandler> = handler_fn("audit", |event| async move {
///     tracing::info!(event_id = %event.id(), "audited");
/// });
/// bus.subscribe("user.created", handler.clone())?;
/// ```
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<FnHandler<F>>
where
    F: Fn(SharedEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnHandler::new(name, f))
}
