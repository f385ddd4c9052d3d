//! Core data model.
//!
//! A work item is a capability: something the engine can run once and that
//! either succeeds or fails. The engine never looks inside it; it only tracks
//! which collection (backlog, processing, failed) each item currently sits in.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Work
// ---------------------------------------------------------------------------

/// Upcast helper so delivered work can be turned back into its concrete type.
///
/// Blanket-implemented for every `'static` type; never implement it by hand.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A unit of executable, independently failable work.
///
/// Implementations capture their inputs at construction and keep their result
/// as post-success state (interior mutability, since `process` takes `&self`).
/// The result travels back to the caller through the success notification,
/// which carries the original [`WorkRef`].
///
/// Returning `Err` and panicking are both treated as failure by the engine.
pub trait Work: AsAny + fmt::Display + Send + Sync + 'static {
    fn process(&self) -> Result<()>;
}

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkId(pub Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a work item.
///
/// The id is assigned once when the work is wrapped, so every clone of a
/// handle compares equal and two separately wrapped items never do, even if
/// their contents are identical. Membership and removal in the engine's
/// collections go through this identity.
#[derive(Clone)]
pub struct WorkRef {
    id: WorkId,
    work: Arc<dyn Work>,
}

impl WorkRef {
    pub fn new<W: Work>(work: W) -> Self {
        Self {
            id: WorkId::new(),
            work: Arc::new(work),
        }
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn process(&self) -> Result<()> {
        self.work.process()
    }

    /// Recover the concrete work type, e.g. to read its result after success.
    pub fn downcast_ref<W: Work>(&self) -> Option<&W> {
        let work: &dyn Work = &*self.work;
        work.as_any().downcast_ref::<W>()
    }
}

impl PartialEq for WorkRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorkRef {}

impl Hash for WorkRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for WorkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkRef")
            .field("id", &self.id)
            .field("work", &self.work.to_string())
            .finish()
    }
}

impl fmt::Display for WorkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.work, self.id)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Point-in-time copy of the queue, taken under the engine lock.
///
/// The three lists are mutually consistent as of one instant and are owned
/// copies: later queue activity never changes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStatus {
    /// Waiting for a worker, in FIFO order.
    pub backlog: Vec<WorkRef>,
    /// Currently being executed by some worker.
    pub processing: Vec<WorkRef>,
    /// Last attempt failed; kept until cleared or requeued.
    pub failed: Vec<WorkRef>,
}

impl QueueStatus {
    /// Nothing waiting and nothing running. Failed items may remain.
    pub fn is_drained(&self) -> bool {
        self.backlog.is_empty() && self.processing.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.is_drained() && self.failed.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts {
            backlog: self.backlog.len(),
            processing: self.processing.len(),
            failed: self.failed.len(),
        }
    }
}

/// Sizes of each collection in a [`QueueStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub backlog: usize,
    pub processing: usize,
    pub failed: usize,
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backlog={} processing={} failed={}",
            self.backlog, self.processing, self.failed
        )
    }
}
