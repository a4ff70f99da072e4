//! Closure-backed commands.

use super::{Command, CommandResult};
use crate::context::ExecutionContext;
use crate::state::State;
use async_trait::async_trait;
use std::fmt::Debug;

/// A command whose body is a synchronous closure.
///
/// Handy for small bookkeeping steps and for tests.
pub struct FnCommand<F>
where
    F: Fn(&mut ExecutionContext) -> CommandResult + Send + Sync,
{
    name: String,
    required_state: Option<State>,
    next_state: State,
    retryable: bool,
    max_retries: u32,
    func: F,
}

impl<F> FnCommand<F>
where
    F: Fn(&mut ExecutionContext) -> CommandResult + Send + Sync,
{
    /// Creates a command that moves the run to `next_state` on success.
    pub fn new(name: impl Into<String>, next_state: impl Into<State>, func: F) -> Self {
        Self {
            name: name.into(),
            required_state: None,
            next_state: next_state.into(),
            retryable: false,
            max_retries: 0,
            func,
        }
    }

    /// Sets the state the run must be in.
    #[must_use]
    pub fn requires(mut self, state: impl Into<State>) -> Self {
        self.required_state = Some(state.into());
        self
    }

    /// Marks the command retryable with up to `max_retries` retries.
    #[must_use]
    pub fn retryable(mut self, max_retries: u32) -> Self {
        self.retryable = true;
        self.max_retries = max_retries;
        self
    }
}

impl<F> Debug for FnCommand<F>
where
    F: Fn(&mut ExecutionContext) -> CommandResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCommand")
            .field("name", &self.name)
            .field("required_state", &self.required_state)
            .field("next_state", &self.next_state)
            .finish()
    }
}

#[async_trait]
impl<F> Command for FnCommand<F>
where
    F: Fn(&mut ExecutionContext) -> CommandResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> CommandResult {
        (self.func)(ctx)
    }

    fn required_state(&self) -> Option<&State> {
        self.required_state.as_ref()
    }

    fn next_state(&self) -> &State {
        &self.next_state
    }

    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
