//! Metric instrument factories for switchboard-rs.
//!
//! Instruments come from the `"switchboard-rs"` meter on the global
//! `MeterProvider`; with no provider installed they are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("switchboard-rs")
}

/// Counter: calls submitted.
/// Labels: `result` ("accepted" | "rejected").
pub fn calls_submitted() -> Counter<u64> {
    meter()
        .u64_counter("switchboard.calls.submitted")
        .with_description("Number of calls submitted to the dispatcher")
        .build()
}

/// Counter: calls resolved.
/// Labels: `outcome`, `reason`.
pub fn calls_resolved() -> Counter<u64> {
    meter()
        .u64_counter("switchboard.calls.resolved")
        .with_description("Number of calls that reached an outcome")
        .build()
}

/// Counter: calls placed on hold because no employee was free.
pub fn calls_held() -> Counter<u64> {
    meter()
        .u64_counter("switchboard.calls.held")
        .with_description("Number of calls placed on hold")
        .build()
}

/// Counter: held calls woken.
/// Labels: `trigger` ("release" | "roster").
pub fn held_wakeups() -> Counter<u64> {
    meter()
        .u64_counter("switchboard.hold.wakeups")
        .with_description("Number of held calls woken for assignment")
        .build()
}

/// Histogram: time an employee spent on a call.
pub fn handling_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("switchboard.handling.duration_ms")
        .with_description("Call handling duration in milliseconds")
        .with_unit("ms")
        .build()
}
