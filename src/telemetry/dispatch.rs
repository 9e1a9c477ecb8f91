//! Call dispatch span helpers.
//!
//! Every accepted call runs inside one span covering assignment, holding
//! and handling.

use tracing::Span;

use crate::model::CallId;

/// Start a span for a dispatched call.
///
/// The `call.state` field is declared empty and is filled by
/// [`record_transition`].
pub fn start_call_span(call_id: CallId) -> Span {
    tracing::info_span!(
        "call.dispatch",
        "call.id" = call_id.0,
        "call.state" = tracing::field::Empty,
    )
}

/// Record a dispatch state change on `span`.
pub fn record_transition(span: &Span, from: &str, to: &str) {
    span.record("call.state", to);
    span.in_scope(|| {
        tracing::debug!(from = from, to = to, "call_transition");
    });
}
