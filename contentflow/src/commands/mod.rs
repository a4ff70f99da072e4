//! Command trait and composites.
//!
//! Commands are the steps of a pipeline. Each declares the state it runs in,
//! the state it moves the run to on success, and its retry policy.

mod conditional;
mod function;
mod group;

pub use conditional::{CommandPredicate, ConditionalCommand};
pub use function::FnCommand;
pub use group::CommandGroup;

use crate::context::ExecutionContext;
use crate::state::State;
use async_trait::async_trait;
use std::fmt::Debug;

/// Result type returned by command hooks.
///
/// Commands may fail with any error; raising a
/// [`PipelineError`](crate::errors::PipelineError) gives the orchestrator a
/// category, a code and an explicit retry flag to act on.
pub type CommandResult<T = ()> = anyhow::Result<T>;

/// One discrete step of a pipeline.
#[async_trait]
pub trait Command: Send + Sync + Debug {
    /// Returns the command name.
    fn name(&self) -> &str;

    /// Runs the command.
    async fn execute(&self, ctx: &mut ExecutionContext) -> CommandResult;

    /// Returns false to skip the command for this run.
    fn can_execute(&self, _ctx: &ExecutionContext) -> bool {
        true
    }

    /// The state the run must be in, or `None` to run from any state.
    fn required_state(&self) -> Option<&State>;

    /// The state the run moves to when the command succeeds.
    fn next_state(&self) -> &State;

    /// Gets first refusal on a failure.
    ///
    /// Returning `Ok(())` marks the failure as handled: the run continues
    /// with the next command and the state is left untouched.
    async fn on_error(&self, _ctx: &mut ExecutionContext, err: anyhow::Error) -> CommandResult {
        Err(err)
    }

    /// Whether failed executions may be retried.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Maximum retries after the first attempt. `0` on a retryable command
    /// means the pipeline default.
    fn max_retries(&self) -> u32 {
        0
    }
}
