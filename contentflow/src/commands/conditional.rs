//! Commands gated by a runtime predicate.

use super::{Command, CommandResult};
use crate::context::ExecutionContext;
use crate::state::State;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A predicate deciding whether a command runs.
pub type CommandPredicate = Arc<dyn Fn(&ExecutionContext) -> bool + Send + Sync>;

/// Wraps a command with a predicate.
///
/// `can_execute` delegates to the predicate (true when none is set); every
/// other method delegates to the wrapped command.
pub struct ConditionalCommand {
    inner: Arc<dyn Command>,
    predicate: Option<CommandPredicate>,
}

impl ConditionalCommand {
    /// Wraps a command with no predicate.
    #[must_use]
    pub fn new(inner: Arc<dyn Command>) -> Self {
        Self {
            inner,
            predicate: None,
        }
    }

    /// Sets the predicate.
    #[must_use]
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Returns the wrapped command.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn Command> {
        &self.inner
    }
}

impl Debug for ConditionalCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalCommand")
            .field("inner", &self.inner)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

#[async_trait]
impl Command for ConditionalCommand {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> CommandResult {
        self.inner.execute(ctx).await
    }

    fn can_execute(&self, ctx: &ExecutionContext) -> bool {
        self.predicate.as_ref().map_or(true, |predicate| predicate(ctx))
    }

    fn required_state(&self) -> Option<&State> {
        self.inner.required_state()
    }

    fn next_state(&self) -> &State {
        self.inner.next_state()
    }

    async fn on_error(&self, ctx: &mut ExecutionContext, err: anyhow::Error) -> CommandResult {
        self.inner.on_error(ctx, err).await
    }

    fn is_retryable(&self) -> bool {
        self.inner.is_retryable()
    }

    fn max_retries(&self) -> u32 {
        self.inner.max_retries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::FnCommand;
    use crate::testing::fixtures::sample_context;

    fn publish() -> Arc<dyn Command> {
        Arc::new(
            FnCommand::new("publish", State::PUBLISHED, |_| Ok(()))
                .requires(State::GENERATED)
                .retryable(4),
        )
    }

    #[test]
    fn test_without_predicate_always_executes() {
        let command = ConditionalCommand::new(publish());
        assert!(command.can_execute(&sample_context()));
    }

    #[test]
    fn test_predicate_gates_execution() {
        let command = ConditionalCommand::new(publish())
            .when(|ctx| ctx.metadata("publish").is_some());

        let mut ctx = sample_context();
        assert!(!command.can_execute(&ctx));

        ctx.set_metadata("publish", serde_json::json!(true));
        assert!(command.can_execute(&ctx));
    }

    #[test]
    fn test_delegates_contract() {
        let command = ConditionalCommand::new(publish()).when(|_| false);

        assert_eq!(command.name(), "publish");
        assert_eq!(command.required_state(), Some(&State::GENERATED));
        assert_eq!(command.next_state(), &State::PUBLISHED);
        assert!(command.is_retryable());
        assert_eq!(command.max_retries(), 4);
        assert_eq!(command.inner().name(), "publish");
    }
}
