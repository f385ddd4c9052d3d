//! The queue engine. Owns the backlog, processing and failed collections and
//! the worker threads that move work between them.
//!
//! One mutex guards all three collections as a unit. Every mutation and every
//! status read takes it; `Work::process` always runs outside it.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use super::worker::{self, POISON_PILL, is_poison_pill};
use crate::error::{Error, Result};
use crate::event::{EventHub, SubscriptionId, WorkFailed, WorkSucceeded};
use crate::model::{QueueStatus, WorkId, WorkRef};
use crate::telemetry::metrics;

/// Exclusive upper bound on the worker count.
pub const MAX_WORKERS: usize = 100;

/// State shared between the engine handle and its workers.
pub(crate) struct Shared {
    pub(crate) state: Mutex<QueueState>,
    /// Signalled on every enqueue.
    pub(crate) work_ready: Condvar,
    /// Signalled when no real work is waiting or running.
    pub(crate) idle: Condvar,
    pub(crate) events: EventHub,
    pub(crate) live_workers: AtomicUsize,
}

/// The three collections plus bookkeeping.
///
/// A given item is in at most one of backlog, processing and failed; `live`
/// holds the ids of everything in any of them.
#[derive(Default)]
pub(crate) struct QueueState {
    backlog: VecDeque<WorkRef>,
    processing: Vec<WorkRef>,
    failed: Vec<WorkRef>,
    live: HashSet<WorkId>,
    /// Real (non poison pill) items in the backlog.
    queued: usize,
}

impl QueueState {
    fn push_back(&mut self, work: WorkRef) {
        if !is_poison_pill(&work) {
            self.queued += 1;
        }
        self.backlog.push_back(work);
    }

    pub(crate) fn pop_front(&mut self) -> Option<WorkRef> {
        let work = self.backlog.pop_front()?;
        if !is_poison_pill(&work) {
            self.queued -= 1;
        }
        Some(work)
    }

    pub(crate) fn start_processing(&mut self, work: WorkRef) {
        self.processing.push(work);
    }

    fn finish_processing(&mut self, work: &WorkRef) {
        if let Some(pos) = self.processing.iter().position(|w| w == work) {
            self.processing.swap_remove(pos);
        }
    }

    /// Success: the engine forgets the item entirely.
    pub(crate) fn complete(&mut self, work: &WorkRef) {
        self.finish_processing(work);
        self.live.remove(&work.id());
    }

    pub(crate) fn fail(&mut self, work: &WorkRef) {
        self.finish_processing(work);
        self.failed.push(work.clone());
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.queued == 0 && self.processing.is_empty()
    }

    fn snapshot(&self) -> QueueStatus {
        QueueStatus {
            backlog: self
                .backlog
                .iter()
                .filter(|w| !is_poison_pill(w))
                .cloned()
                .collect(),
            processing: self.processing.clone(),
            failed: self.failed.clone(),
        }
    }
}

/// A fixed pool of worker threads consuming a shared, unbounded backlog.
///
/// Workers start at construction. Failed items accumulate until cleared or
/// requeued; nothing is retried automatically. Dropping the queue stops it.
///
/// # Handlers
///
/// Success and failure handlers run on the worker thread with the state lock
/// held. A handler must not call back into the same queue (`status`,
/// `enqueue`, ...) or subscribe/unsubscribe: doing so deadlocks.
pub struct WorkerQueue {
    shared: Arc<Shared>,
    worker_count: usize,
    workers: Vec<JoinHandle<()>>,
    stopped: AtomicBool,
}

impl WorkerQueue {
    /// Create the queue and start `worker_count` worker threads.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` unless `1 <= worker_count < MAX_WORKERS`;
    /// `Io` if a thread cannot be spawned (already started workers are stopped).
    pub fn new(worker_count: usize) -> Result<Self> {
        if worker_count < 1 {
            return Err(Error::InvalidConfiguration(
                "worker count must be > 0".to_string(),
            ));
        }
        if worker_count >= MAX_WORKERS {
            return Err(Error::InvalidConfiguration(format!(
                "worker count must be < {MAX_WORKERS}, got {worker_count}"
            )));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            work_ready: Condvar::new(),
            idle: Condvar::new(),
            events: EventHub::new(),
            live_workers: AtomicUsize::new(0),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let name = format!("bgqueue-worker-{i}");
            let worker_shared = Arc::clone(&shared);
            shared.live_workers.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker::run(name, worker_shared));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shared.live_workers.fetch_sub(1, Ordering::SeqCst);
                    error!(worker = i, error = %e, "failed to spawn worker, stopping the rest");
                    let mut state = shared.state.lock();
                    for _ in 0..workers.len() {
                        state.push_back(POISON_PILL.clone());
                    }
                    shared.work_ready.notify_all();
                    return Err(e.into());
                }
            }
        }

        info!(workers = worker_count, "worker queue started");

        Ok(Self {
            shared,
            worker_count,
            workers,
            stopped: AtomicBool::new(false),
        })
    }

    /// Configured pool size.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Worker threads that have not yet consumed their poison pill.
    pub fn live_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::SeqCst)
    }

    /// Append `work` to the backlog and wake one idle worker.
    ///
    /// After [`stop`](Self::stop) this still succeeds, but the item may never
    /// be picked up.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if this exact item is already waiting, processing
    /// or failed.
    pub fn enqueue(&self, work: WorkRef) -> Result<()> {
        let mut state = self.shared.state.lock();
        if !state.live.insert(work.id()) {
            return Err(Error::InvalidArgument(format!(
                "work {work} is already in the queue"
            )));
        }
        debug!(id = %work.id(), "work enqueued");
        state.push_back(work);
        self.shared.work_ready.notify_one();
        drop(state);

        metrics::work_enqueued().add(1, &[]);
        Ok(())
    }

    /// Consistent snapshot of backlog, processing and failed.
    pub fn status(&self) -> QueueStatus {
        self.shared.state.lock().snapshot()
    }

    /// Forget every failed item.
    pub fn clear_errors(&self) {
        let mut state = self.shared.state.lock();
        let QueueState { failed, live, .. } = &mut *state;
        for work in failed.drain(..) {
            live.remove(&work.id());
        }
    }

    /// Forget the given items if they are in the failed set. Others are ignored.
    pub fn clear_errors_for(&self, items: &[WorkRef]) {
        let targets: HashSet<WorkId> = items.iter().map(WorkRef::id).collect();
        let mut state = self.shared.state.lock();
        let QueueState { failed, live, .. } = &mut *state;
        failed.retain(|work| {
            if targets.contains(&work.id()) {
                live.remove(&work.id());
                false
            } else {
                true
            }
        });
    }

    /// Move the given items from the failed set to the tail of the backlog.
    ///
    /// Items not currently failed are left alone. Returns how many moved.
    pub fn re_add_failed(&self, items: &[WorkRef]) -> usize {
        let mut moved = 0;
        {
            let mut state = self.shared.state.lock();
            for item in items {
                let Some(pos) = state.failed.iter().position(|w| w == item) else {
                    continue;
                };
                let work = state.failed.remove(pos);
                state.push_back(work);
                self.shared.work_ready.notify_one();
                moved += 1;
            }
        }

        if moved > 0 {
            debug!(count = moved, "failed work requeued");
            metrics::work_requeued().add(moved as u64, &[]);
        }
        moved
    }

    /// Block until no real work is waiting or running.
    ///
    /// Returns `false` if `timeout` elapses first. Failed items do not count.
    /// After `stop` the remaining backlog may never drain, so pass a timeout.
    pub fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.shared.state.lock();
        while !state.is_idle() {
            match deadline {
                Some(deadline) => {
                    if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                        return state.is_idle();
                    }
                }
                None => self.shared.idle.wait(&mut state),
            }
        }
        true
    }

    /// Enqueue one poison pill per worker so every worker exits.
    ///
    /// Terminal and idempotent: only the first call has an effect. Items
    /// already processing finish normally; work queued afterward is not
    /// guaranteed to run.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.shared.state.lock();
        for _ in 0..self.worker_count {
            state.push_back(POISON_PILL.clone());
        }
        self.shared.work_ready.notify_all();
        info!(workers = self.worker_count, "worker queue stopping");
    }

    /// Stop and wait for every worker thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
        for handle in std::mem::take(&mut self.workers) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        info!("worker queue shut down");
    }

    /// Subscribe to successful completions.
    pub fn on_succeeded<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&WorkSucceeded) + Send + Sync + 'static,
    {
        self.shared.events.on_succeeded(handler)
    }

    /// Subscribe to failures.
    pub fn on_failed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&WorkFailed) + Send + Sync + 'static,
    {
        self.shared.events.on_failed(handler)
    }

    /// Remove a subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }
}

impl Drop for WorkerQueue {
    fn drop(&mut self) {
        self.stop();
    }
}
