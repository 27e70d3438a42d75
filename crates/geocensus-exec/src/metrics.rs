//! Tracing hooks for materialization milestones.
//!
//! Events are emitted at `trace` inside a `geocensus` span; a subscriber in
//! the binary decides whether they go anywhere.

pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::trace_span!("geocensus", event);
    let _entered = span.enter();
    for (k, v) in key_values {
        tracing::trace!(%event, key = %k, value = %v, "metric");
    }
}
