//! Lifecycle events and their delivery.
//!
//! The orchestrator emits a [`PipelineEvent`] at every run and step
//! boundary through an injected [`EventSink`]. A process-wide default sink
//! can be installed for callers that do not wire one explicitly.

mod bus;
mod event;
mod sink;

pub use bus::{BusMetrics, EventBus, EventHandler};
pub use event::{EventKind, PipelineEvent};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;

static DEFAULT_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Installs the process-wide default event sink.
pub fn set_default_sink(sink: Arc<dyn EventSink>) {
    *DEFAULT_EVENT_SINK.write() = Some(sink);
}

/// Clears the process-wide default event sink.
pub fn clear_default_sink() {
    *DEFAULT_EVENT_SINK.write() = None;
}

/// Returns the process-wide default event sink.
///
/// Returns a `NoOpEventSink` if none is installed.
pub fn default_sink() -> Arc<dyn EventSink> {
    DEFAULT_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}
