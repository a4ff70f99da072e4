//! Pipeline building and execution.
//!
//! This module provides:
//! - The [`Pipeline`] orchestrator and its [`RunReport`]
//! - [`PipelineBuilder`] with validation
//! - Retry strategies and error handlers
//! - [`PipelineConfig`] loading

mod builder;
mod config;
mod error_handler;
mod orchestrator;
mod retry;

pub use builder::PipelineBuilder;
pub use config::{
    ConfigError, PipelineConfig, ENV_EVENT_QUEUE_SIZE, ENV_MAX_RETRIES, ENV_PIPELINE_NAME,
    ENV_RETRY_BASE_MS, ENV_RETRY_MAX_MS,
};
#[cfg(test)]
pub use error_handler::MockErrorHandler;
pub use error_handler::{DefaultErrorHandler, ErrorAction, ErrorHandler};
pub use orchestrator::{Pipeline, RunReport};
pub use retry::{sleep_or_cancel, ExponentialBackoff, RetryConfig, RetryStrategy, WaitCancelled};
