//! Metric instrument factories for bgqueue.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one (tests, no OTLP endpoint) the instruments are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("bgqueue")
}

/// Counter: work items accepted by `enqueue`.
pub fn work_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("bgqueue.work.enqueued")
        .with_description("Number of work items enqueued")
        .build()
}

/// Counter: finished executions.
/// Labels: `result` ("succeeded" | "failed").
pub fn work_completed() -> Counter<u64> {
    meter()
        .u64_counter("bgqueue.work.completed")
        .with_description("Number of work item executions by result")
        .build()
}

/// Counter: failed items moved back to the backlog.
pub fn work_requeued() -> Counter<u64> {
    meter()
        .u64_counter("bgqueue.work.requeued")
        .with_description("Number of failed work items requeued")
        .build()
}

/// Histogram: time spent inside `Work::process`.
pub fn work_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("bgqueue.work.duration_ms")
        .with_description("Work item processing duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: drain rounds run by the report aggregator.
/// Labels: `report`.
pub fn report_rounds() -> Counter<u64> {
    meter()
        .u64_counter("bgqueue.report.rounds")
        .with_description("Number of drain-and-retry rounds per report")
        .build()
}
