//! Test assertions for pipeline runs.

use crate::context::ExecutionContext;
use crate::errors::PipelineRunError;
use crate::events::{CollectingEventSink, EventKind};
use crate::state::State;

/// Asserts that the context ended in `expected`.
pub fn assert_final_state(ctx: &ExecutionContext, expected: &State) {
    assert_eq!(
        ctx.current_state(),
        expected,
        "Expected final state {}, got {} (history: {:?})",
        expected,
        ctx.current_state(),
        ctx.state_machine()
            .history()
            .iter()
            .map(|t| format!("{} -> {}", t.from, t.to))
            .collect::<Vec<_>>()
    );
}

/// Asserts that the sink collected exactly these event kinds, in order.
pub fn assert_event_sequence(sink: &CollectingEventSink, expected: &[EventKind]) {
    let actual = sink.kinds();
    assert_eq!(
        actual, expected,
        "Expected events {:?}, got {:?}",
        expected, actual
    );
}

/// Asserts that a run error carries the given code.
pub fn assert_run_error_code(err: &PipelineRunError, code: &str) {
    assert_eq!(err.code(), code, "Expected error code {code}, got {err}");
}
