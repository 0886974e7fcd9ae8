//! Handler registry - per-topic ordered list of registrations.
//!
//! Each registration is identified by a [`SubscriptionId`] handed back from
//! subscribe, and also remembers the handler `Arc` so callers can unsubscribe
//! by pointer identity. Readers take a snapshot and release the lock before
//! any handler runs.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::foundation::EventBusError;
use crate::ports::EventHandler;

/// Handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// How a registration is dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Remove the registration after its first invocation
    pub once: bool,
    /// Run on its own task instead of inline with the publisher
    pub is_async: bool,
    /// Never overlap with itself when run asynchronously
    pub transactional: bool,
}

impl HandlerOptions {
    pub const SYNC: Self = Self {
        once: false,
        is_async: false,
        transactional: false,
    };

    pub const SYNC_ONCE: Self = Self {
        once: true,
        is_async: false,
        transactional: false,
    };

    pub const fn asynchronous(transactional: bool) -> Self {
        Self {
            once: false,
            is_async: true,
            transactional,
        }
    }

    pub const ASYNC_ONCE: Self = Self {
        once: true,
        is_async: true,
        transactional: false,
    };
}

/// One handler registered on one topic.
pub(crate) struct Registration {
    pub(crate) id: SubscriptionId,
    pub(crate) handler: Arc<dyn EventHandler>,
    pub(crate) options: HandlerOptions,
    fired: AtomicBool,
    serial: tokio::sync::Mutex<()>,
}

impl Registration {
    /// Claims the right to invoke the handler.
    ///
    /// Always true for repeating handlers; true exactly once for once-handlers,
    /// even when several publishes race on the same snapshot.
    pub(crate) fn claim(&self) -> bool {
        !self.options.once || !self.fired.swap(true, Ordering::SeqCst)
    }

    /// Serialises invocations of a transactional registration.
    pub(crate) async fn serial_guard(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        if self.options.transactional {
            Some(self.serial.lock().await)
        } else {
            None
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("handler", &self.handler.name())
            .field("options", &self.options)
            .finish()
    }
}

/// Compares handlers by the address of their shared allocation.
fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Topic-keyed registry of handlers.
///
/// # Thread Safety
///
/// A single `RwLock` guards the map: subscribe/unsubscribe/clear write,
/// snapshot and lookups read. Empty topics are dropped from the map.
pub(crate) struct HandlerRegistry {
    topics: RwLock<HashMap<String, Vec<Arc<Registration>>>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends a registration to `topic`.
    pub(crate) fn insert(
        &self,
        topic: &str,
        handler: Arc<dyn EventHandler>,
        options: HandlerOptions,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            handler,
            options,
            fired: AtomicBool::new(false),
            serial: tokio::sync::Mutex::new(()),
        });

        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(registration);

        id
    }

    /// Removes the registration `id` from `topic`.
    pub(crate) fn remove(
        &self,
        topic: &str,
        id: SubscriptionId,
    ) -> Result<Arc<Registration>, EventBusError> {
        self.remove_where(topic, |registration| registration.id == id)
    }

    /// Removes the first registration of `handler` on `topic`.
    pub(crate) fn remove_handler(
        &self,
        topic: &str,
        handler: &Arc<dyn EventHandler>,
    ) -> Result<Arc<Registration>, EventBusError> {
        self.remove_where(topic, |registration| {
            same_handler(&registration.handler, handler)
        })
    }

    fn remove_where(
        &self,
        topic: &str,
        matches: impl Fn(&Registration) -> bool,
    ) -> Result<Arc<Registration>, EventBusError> {
        let mut topics = self.topics.write();
        let registrations = topics
            .get_mut(topic)
            .ok_or_else(|| EventBusError::topic_not_found(topic))?;

        let index = registrations
            .iter()
            .position(|registration| matches(registration))
            .ok_or_else(|| EventBusError::handler_not_found(topic))?;

        let removed = registrations.remove(index);
        if registrations.is_empty() {
            topics.remove(topic);
        }
        Ok(removed)
    }

    /// Copies the registrations of `topic` in registration order.
    pub(crate) fn snapshot(&self, topic: &str) -> Vec<Arc<Registration>> {
        self.topics
            .read()
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn has_handlers(&self, topic: &str) -> bool {
        self.topics
            .read()
            .get(topic)
            .is_some_and(|registrations| !registrations.is_empty())
    }

    pub(crate) fn handler_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }

    pub(crate) fn topics(&self) -> Vec<String> {
        self.topics.read().keys().cloned().collect()
    }

    /// Drops every registration, returning how many were removed.
    pub(crate) fn clear(&self) -> usize {
        let mut topics = self.topics.write();
        let removed = topics.values().map(Vec::len).sum();
        topics.clear();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SharedEvent;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl EventHandler for Noop {
        async fn handle(&self, _: SharedEvent) {}
    }

    fn noop() -> Arc<dyn EventHandler> {
        Arc::new(Noop)
    }

    #[test]
    fn insert_preserves_registration_order() {
        let registry = HandlerRegistry::new();
        let first = registry.insert("t", noop(), HandlerOptions::SYNC);
        let second = registry.insert("t", noop(), HandlerOptions::SYNC);
        let third = registry.insert("t", noop(), HandlerOptions::SYNC);

        let ids: Vec<_> = registry.snapshot("t").iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[test]
    fn remove_reports_missing_topic_and_missing_handler() {
        let registry = HandlerRegistry::new();
        let id = registry.insert("t", noop(), HandlerOptions::SYNC);
        let other = registry.insert("u", noop(), HandlerOptions::SYNC);

        assert_eq!(
            registry.remove("missing", id).unwrap_err(),
            EventBusError::topic_not_found("missing")
        );
        assert_eq!(
            registry.remove("t", other).unwrap_err(),
            EventBusError::handler_not_found("t")
        );
    }

    #[test]
    fn removing_last_registration_drops_topic() {
        let registry = HandlerRegistry::new();
        let id = registry.insert("t", noop(), HandlerOptions::SYNC);

        registry.remove("t", id).unwrap();

        assert!(!registry.has_handlers("t"));
        assert!(registry.topics().is_empty());
    }

    #[test]
    fn remove_handler_matches_identity_and_removes_first_only() {
        let registry = HandlerRegistry::new();
        let shared = noop();
        let first = registry.insert("t", shared.clone(), HandlerOptions::SYNC);
        registry.insert("t", noop(), HandlerOptions::SYNC);
        let third = registry.insert("t", shared.clone(), HandlerOptions::SYNC);

        let removed = registry.remove_handler("t", &shared).unwrap();
        assert_eq!(removed.id, first);

        let remaining: Vec<_> = registry.snapshot("t").iter().map(|r| r.id).collect();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[1], third);

        // A distinct allocation of the same handler type is a different handler
        assert!(registry.remove_handler("t", &noop()).is_err());
    }

    #[test]
    fn snapshot_is_detached_from_later_changes() {
        let registry = HandlerRegistry::new();
        let id = registry.insert("t", noop(), HandlerOptions::SYNC);
        let snapshot = registry.snapshot("t");

        registry.remove("t", id).unwrap();
        registry.insert("t", noop(), HandlerOptions::SYNC);
        registry.insert("t", noop(), HandlerOptions::SYNC);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.handler_count("t"), 2);
    }

    #[test]
    fn once_registration_can_be_claimed_once() {
        let registry = HandlerRegistry::new();
        registry.insert("t", noop(), HandlerOptions::SYNC_ONCE);
        registry.insert("t", noop(), HandlerOptions::SYNC);
        let snapshot = registry.snapshot("t");

        assert!(snapshot[0].claim());
        assert!(!snapshot[0].claim());
        assert!(snapshot[1].claim());
        assert!(snapshot[1].claim());
    }

    #[test]
    fn clear_counts_removed_registrations() {
        let registry = HandlerRegistry::new();
        registry.insert("a", noop(), HandlerOptions::SYNC);
        registry.insert("a", noop(), HandlerOptions::asynchronous(false));
        registry.insert("b", noop(), HandlerOptions::ASYNC_ONCE);

        assert_eq!(registry.clear(), 3);
        assert!(!registry.has_handlers("a"));
    }

    #[test]
    fn subscription_ids_display_with_prefix() {
        let registry = HandlerRegistry::new();
        let id = registry.insert("t", noop(), HandlerOptions::SYNC);
        assert_eq!(id.to_string(), "sub-1");
    }
}
