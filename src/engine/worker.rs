//! Per-thread consume loop and the poison pill that ends it.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::Ordering;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use chrono::Utc;
use opentelemetry::KeyValue;
use tracing::{debug, info, warn};

use super::queue::Shared;
use crate::error::{Error, Result};
use crate::event::{WorkFailed, WorkSucceeded};
use crate::model::{Work, WorkRef};
use crate::telemetry::metrics;
use crate::telemetry::work::{record_outcome, start_work_span};

/// Never executed; dequeuing it tells exactly one worker to exit.
struct PoisonPill;

impl Work for PoisonPill {
    fn process(&self) -> Result<()> {
        Err(Error::ProtocolViolation(
            "a poison pill must not be processed".to_string(),
        ))
    }
}

impl fmt::Display for PoisonPill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("poison-pill")
    }
}

/// The single sentinel instance, distinct by identity from all real work.
pub(crate) static POISON_PILL: LazyLock<WorkRef> = LazyLock::new(|| WorkRef::new(PoisonPill));

pub(crate) fn is_poison_pill(work: &WorkRef) -> bool {
    *work == *POISON_PILL
}

/// Consume work until a poison pill arrives.
pub(crate) fn run(name: String, shared: Arc<Shared>) {
    debug!(worker = %name, "worker started");

    loop {
        let work = {
            let mut state = shared.state.lock();
            let work = loop {
                if let Some(work) = state.pop_front() {
                    break work;
                }
                shared.work_ready.wait(&mut state);
            };
            if is_poison_pill(&work) {
                break;
            }
            state.start_processing(work.clone());
            work
        };

        let span = start_work_span(&name, &work.id().0);
        let started = Instant::now();
        let outcome = span.in_scope(|| execute(&name, &work));
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let result = if outcome.is_ok() { "succeeded" } else { "failed" };
        record_outcome(&span, result);
        metrics::work_duration_ms().record(duration_ms, &[]);
        metrics::work_completed().add(1, &[KeyValue::new("result", result)]);

        // Collection update and notification are one step under the lock.
        let mut state = shared.state.lock();
        match outcome {
            Ok(()) => {
                state.complete(&work);
                shared.events.succeeded(WorkSucceeded {
                    work,
                    worker: name.clone(),
                    at: Utc::now(),
                });
            }
            Err(message) => {
                warn!(worker = %name, id = %work.id(), %message, "work failed");
                state.fail(&work);
                shared.events.failed(WorkFailed {
                    work,
                    worker: name.clone(),
                    message,
                    at: Utc::now(),
                });
            }
        }
        if state.is_idle() {
            shared.idle.notify_all();
        }
    }

    shared.live_workers.fetch_sub(1, Ordering::SeqCst);
    info!(worker = %name, "worker stopped");
}

/// Run one item, turning both returned errors and panics into a message.
fn execute(worker: &str, work: &WorkRef) -> std::result::Result<(), String> {
    match catch_unwind(AssertUnwindSafe(|| work.process())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!(
            "worker {worker}: failed to process work {}: {e}",
            describe(work)
        )),
        Err(payload) => Err(format!(
            "worker {worker}: unexpected panic while processing work {}: {}",
            describe(work),
            panic_message(payload.as_ref())
        )),
    }
}

/// Render an item for a failure message. Its `Display` is user code and may
/// panic too; fall back to the id.
fn describe(work: &WorkRef) -> String {
    catch_unwind(AssertUnwindSafe(|| work.to_string()))
        .unwrap_or_else(|_| format!("<unprintable> [{}]", work.id()))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
