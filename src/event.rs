//! Success and failure notifications emitted by the engine.
//!
//! Any number of observers may subscribe, before or during the engine's
//! lifetime. Handlers run on the worker thread while the engine's state lock
//! is held, so they must be fast and must not call back into the engine.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::error;

use crate::model::WorkRef;

/// A work item completed without error.
#[derive(Debug, Clone)]
pub struct WorkSucceeded {
    pub work: WorkRef,
    /// Name of the worker thread that ran it.
    pub worker: String,
    pub at: DateTime<Utc>,
}

/// A work item failed and has been added to the failed set.
#[derive(Debug, Clone)]
pub struct WorkFailed {
    pub work: WorkRef,
    pub worker: String,
    /// Worker name plus the item's rendering, and the fault if one was returned.
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Handle returned by a subscription; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Subscribers<E> {
    handlers: RwLock<Vec<(SubscriptionId, Handler<E>)>>,
}

impl<E> Subscribers<E> {
    fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    fn add(&self, id: SubscriptionId, handler: Handler<E>) {
        self.handlers.write().push((id, handler));
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        handlers.len() != before
    }

    /// Invoke every handler. A panicking handler is logged and skipped.
    fn fire(&self, kind: &'static str, event: &E) {
        for (id, handler) in self.handlers.read().iter() {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(subscription = id.0, kind, "event handler panicked");
            }
        }
    }
}

/// Multicast registry of success and failure observers.
pub(crate) struct EventHub {
    next_id: AtomicU64,
    succeeded: Subscribers<WorkSucceeded>,
    failed: Subscribers<WorkFailed>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            succeeded: Subscribers::new(),
            failed: Subscribers::new(),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn on_succeeded<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&WorkSucceeded) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.succeeded.add(id, Arc::new(handler));
        id
    }

    pub(crate) fn on_failed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&WorkFailed) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.failed.add(id, Arc::new(handler));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        // Ids are unique across both lists.
        self.succeeded.remove(id) || self.failed.remove(id)
    }

    pub(crate) fn succeeded(&self, event: WorkSucceeded) {
        self.succeeded.fire("succeeded", &event);
    }

    pub(crate) fn failed(&self, event: WorkFailed) {
        self.failed.fire("failed", &event);
    }
}
