//! # Contentflow
//!
//! A state-machine driven job pipeline for content generation workflows.
//!
//! A job moves through a fixed set of workflow states (validation, topic and
//! category selection, prompt preparation, generation, publication) by way
//! of an ordered list of commands. Contentflow provides:
//!
//! - **Guarded state transitions**: every step is checked against a transition table
//! - **Typed faults**: errors carry a category, a code and an explicit retry flag
//! - **Retry with backoff**: cancellable waits between attempts
//! - **Error policies**: retry, fail, pause, recover or continue per fault
//! - **Lifecycle events**: pluggable sinks plus an async fan-out bus
//! - **Cancellation**: cooperative, observed between commands and during backoff
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contentflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::new("content-pipeline")
//!     .command(Arc::new(ValidateJob::new(repo)))
//!     .command(Arc::new(SelectTopic::new()))
//!     .build()?;
//!
//! let report = pipeline.execute(Arc::new(CancellationToken::new()), job).await?;
//! assert!(report.is_completed());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod commands;
pub mod context;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod ports;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::commands::{
        Command, CommandGroup, CommandResult, ConditionalCommand, FnCommand,
    };
    pub use crate::context::{ExecutionContext, Job};
    pub use crate::errors::{
        as_fault, codes, wrap_error, ErrorCategory, PipelineError, PipelineRunError,
        PipelineValidationError,
    };
    pub use crate::events::{
        CollectingEventSink, EventBus, EventKind, EventSink, LoggingEventSink, NoOpEventSink,
        PipelineEvent,
    };
    pub use crate::observability::{init_json_tracing, init_tracing};
    pub use crate::pipeline::{
        DefaultErrorHandler, ErrorAction, ErrorHandler, ExponentialBackoff, Pipeline,
        PipelineBuilder, PipelineConfig, RetryConfig, RetryStrategy,
        RunReport,
    };
    pub use crate::ports::TopicStrategy;
    pub use crate::state::{State, StateMachine, TransitionTable};
    pub use std::sync::Arc;
}
