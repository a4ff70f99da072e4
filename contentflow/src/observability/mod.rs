//! Logging setup and timing helpers.

mod logging;
mod timer;

pub use logging::{init_json_tracing, init_tracing};
pub use timer::SpanTimer;
