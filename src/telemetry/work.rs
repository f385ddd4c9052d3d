//! Work execution span helpers.
//!
//! One span per processed item, tagged with the worker that ran it.

use tracing::Span;
use uuid::Uuid;

/// Start a span for one execution of a work item.
///
/// The `work.outcome` field is declared empty and filled by [`record_outcome`].
pub fn start_work_span(worker: &str, work_id: &Uuid) -> Span {
    tracing::info_span!(
        "work.process",
        "work.worker" = worker,
        "work.id" = %work_id,
        "work.outcome" = tracing::field::Empty,
    )
}

/// Record how the execution ended (`"succeeded"` or `"failed"`).
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("work.outcome", outcome);
    span.in_scope(|| {
        tracing::debug!(outcome, "work processed");
    });
}
