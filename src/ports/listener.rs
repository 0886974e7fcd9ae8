//! Listener port - Named, fallible callback for a topic.
//!
//! A `Listener` is the single-method alternative to a bare handler closure
//! for callers that want a named type. It receives a cancellation token and
//! may fail; [`ListenerHandler`] adapts it to the bus's [`EventHandler`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::{HandlerError, SharedEvent};

use super::EventHandler;

/// Single-method event callback.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Handle an event. `cancel` is the listener's lifetime token.
    async fn handle(&self, cancel: &CancellationToken, event: SharedEvent)
        -> Result<(), HandlerError>;
}

/// Listener built from an async closure.
pub struct ListenerFn<F>(F);

#[async_trait]
impl<F, Fut> Listener for ListenerFn<F>
where
    F: Fn(CancellationToken, SharedEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(
        &self,
        cancel: &CancellationToken,
        event: SharedEvent,
    ) -> Result<(), HandlerError> {
        (self.0)(cancel.clone(), event).await
    }
}

/// Creates a listener from an async closure.
pub fn listener_fn<F, Fut>(f: F) -> ListenerFn<F>
where
    F: Fn(CancellationToken, SharedEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    ListenerFn(f)
}

/// Adapts a [`Listener`] so it can be subscribed like any handler.
///
/// Listener failures have nowhere to go: they are logged at `warn` and
/// dropped. Once the adapter's token is cancelled the listener is skipped.
pub struct ListenerHandler<L> {
    name: String,
    listener: L,
    cancel: CancellationToken,
}

impl<L: Listener> ListenerHandler<L> {
    /// Wraps `listener` with a fresh lifetime token.
    pub fn new(name: impl Into<String>, listener: L) -> Self {
        Self::with_cancellation(name, listener, CancellationToken::new())
    }

    /// Wraps `listener` sharing an existing lifetime token.
    pub fn with_cancellation(
        name: impl Into<String>,
        listener: L,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            listener,
            cancel,
        }
    }

    /// Create as Arc for subscribing.
    pub fn new_shared(name: impl Into<String>, listener: L) -> Arc<Self> {
        Arc::new(Self::new(name, listener))
    }

    /// Token passed to every invocation; cancelling it retires the listener.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait]
impl<L: Listener> EventHandler for ListenerHandler<L> {
    async fn handle(&self, event: SharedEvent) {
        if self.cancel.is_cancelled() {
            tracing::trace!(listener = %self.name, event_id = %event.id(), "Listener cancelled, skipping event");
            return;
        }

        let event_id = event.id().clone();
        if let Err(error) = self.listener.handle(&self.cancel, event).await {
            tracing::warn!(
                listener = %self.name,
                event_id = %event_id,
                error = %error,
                details = ?error.details,
                "Listener failed to handle event"
            );
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::BaseEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn Listener) {}

    struct CountingListener {
        count: AtomicUsize,
    }

    #[async_trait]
    impl Listener for CountingListener {
        async fn handle(
            &self,
            _cancel: &CancellationToken,
            _event: SharedEvent,
        ) -> Result<(), HandlerError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn listener_handler_forwards_events() {
        let handler = ListenerHandler::new(
            "counting",
            CountingListener {
                count: AtomicUsize::new(0),
            },
        );

        handler.handle(BaseEvent::new("a").shared()).await;
        handler.handle(BaseEvent::new("a").shared()).await;

        assert_eq!(handler.listener.count.load(Ordering::SeqCst), 2);
        assert_eq!(EventHandler::name(&handler), "counting");
    }

    #[tokio::test]
    async fn listener_failure_is_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let handler = ListenerHandler::new(
            "failing",
            listener_fn(move |_cancel, _event| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err(HandlerError::new("downstream unavailable"))
                }
            }),
        );

        handler.handle(BaseEvent::new("a").shared()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_listener_is_skipped() {
        let handler = ListenerHandler::new(
            "counting",
            CountingListener {
                count: AtomicUsize::new(0),
            },
        );
        handler.cancellation_token().cancel();

        handler.handle(BaseEvent::new("a").shared()).await;

        assert_eq!(handler.listener.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn listener_fn_receives_its_token() {
        let token = CancellationToken::new();
        let listener = listener_fn(|cancel: CancellationToken, _event| async move {
            if cancel.is_cancelled() {
                Err(HandlerError::new("cancelled"))
            } else {
                Ok(())
            }
        });

        assert!(listener
            .handle(&token, BaseEvent::new("a").shared())
            .await
            .is_ok());
        token.cancel();
        assert!(listener
            .handle(&token, BaseEvent::new("a").shared())
            .await
            .is_err());
    }
}
