//! Outstanding-work counter for asynchronous handler invocations.
//!
//! Incremented when an invocation is launched, decremented when its guard
//! drops. Dropping happens on completion and on unwinding, so a panicking
//! handler cannot leave `wait` hanging.

use std::sync::Arc;
use tokio::sync::watch;

/// Counted wait-group over in-flight work.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    count: Arc<watch::Sender<usize>>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
        }
    }

    /// Registers one unit of work. The unit completes when the guard drops.
    pub(crate) fn start(&self) -> InFlightGuard {
        self.count.send_modify(|n| *n += 1);
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Current number of outstanding units.
    pub(crate) fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Waits until no work is outstanding.
    pub(crate) async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Completion token for one unit of in-flight work.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
