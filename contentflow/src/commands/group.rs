//! Sequential command composite.

use super::{Command, CommandResult};
use crate::context::ExecutionContext;
use crate::state::State;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Runs a fixed list of sub-commands in order as a single step.
///
/// Sub-commands whose `can_execute` is false are skipped. The first error
/// stops the group and is propagated unchanged. Sub-commands' own states are
/// not consulted; the group declares the step's states and retry policy.
#[derive(Debug)]
pub struct CommandGroup {
    name: String,
    commands: Vec<Arc<dyn Command>>,
    required_state: Option<State>,
    next_state: State,
    retryable: bool,
    max_retries: u32,
}

impl CommandGroup {
    /// Creates an empty group that moves the run to `next_state`.
    #[must_use]
    pub fn new(name: impl Into<String>, next_state: impl Into<State>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            required_state: None,
            next_state: next_state.into(),
            retryable: false,
            max_retries: 0,
        }
    }

    /// Appends a sub-command.
    #[must_use]
    pub fn with_command(mut self, command: Arc<dyn Command>) -> Self {
        self.commands.push(command);
        self
    }

    /// Sets the state the run must be in.
    #[must_use]
    pub fn requires(mut self, state: impl Into<State>) -> Self {
        self.required_state = Some(state.into());
        self
    }

    /// Marks the whole group retryable.
    #[must_use]
    pub fn retryable(mut self, max_retries: u32) -> Self {
        self.retryable = true;
        self.max_retries = max_retries;
        self
    }

    /// Returns the sub-commands.
    #[must_use]
    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }
}

#[async_trait]
impl Command for CommandGroup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> CommandResult {
        for command in &self.commands {
            if !command.can_execute(ctx) {
                debug!(group = %self.name, command = command.name(), "Skipping sub-command");
                continue;
            }
            command.execute(ctx).await?;
        }
        Ok(())
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
