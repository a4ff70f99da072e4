//! Testing utilities for contentflow pipelines.
//!
//! This module provides:
//! - Scripted mock commands and a non-sleeping retry strategy
//! - Fixtures for jobs, contexts and phase records
//! - Assertions over final states and emitted events

mod assertions;
pub mod fixtures;
pub mod mocks;

pub use assertions::{assert_event_sequence, assert_final_state, assert_run_error_code};
pub use fixtures::{sample_context, sample_job, StaticTopicStrategy};
pub use mocks::{MockCommand, MockOutcome, RecordingRetryStrategy};
