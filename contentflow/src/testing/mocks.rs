//! Mock commands and strategies for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::commands::{Command, CommandResult};
use crate::context::ExecutionContext;
use crate::errors::PipelineError;
use crate::pipeline::{ExponentialBackoff, RetryStrategy, WaitCancelled};
use crate::state::State;

/// A scripted outcome for one [`MockCommand`] invocation.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Succeed.
    Succeed,
    /// Fail with this fault.
    Fault(PipelineError),
    /// Fail with an opaque error carrying this message.
    Error(String),
    /// Cancel the run's token with this reason, then fail.
    Cancel(String),
}

/// A command that records calls and plays back scripted outcomes.
///
/// Outcomes are consumed in order; once the script is exhausted the
/// fallback outcome (success by default) is returned.
#[derive(Debug)]
pub struct MockCommand {
    name: String,
    required_state: Option<State>,
    next_state: State,
    retryable: bool,
    max_retries: u32,
    enabled: bool,
    recover: bool,
    script: Mutex<VecDeque<MockOutcome>>,
    fallback: Mutex<MockOutcome>,
    call_count: Mutex<usize>,
    on_error_count: Mutex<usize>,
}

impl MockCommand {
    /// Creates a mock that moves the run to `next_state` and always succeeds.
    #[must_use]
    pub fn new(name: impl Into<String>, next_state: impl Into<State>) -> Self {
        Self {
            name: name.into(),
            required_state: None,
            next_state: next_state.into(),
            retryable: false,
            max_retries: 0,
            enabled: true,
            recover: false,
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(MockOutcome::Succeed),
            call_count: Mutex::new(0),
            on_error_count: Mutex::new(0),
        }
    }

    /// Sets the required state.
    #[must_use]
    pub fn requires(mut self, state: impl Into<State>) -> Self {
        self.required_state = Some(state.into());
        self
    }

    /// Marks the command retryable.
    #[must_use]
    pub fn retryable(mut self, max_retries: u32) -> Self {
        self.retryable = true;
        self.max_retries = max_retries;
        self
    }

    /// Makes `can_execute` return false.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Makes `on_error` report every failure as handled.
    #[must_use]
    pub fn recovering(mut self) -> Self {
        self.recover = true;
        self
    }

    /// Queues outcomes for the next invocations.
    #[must_use]
    pub fn then(self, outcome: MockOutcome) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    /// Sets the outcome returned once the script is exhausted.
    #[must_use]
    pub fn otherwise(self, outcome: MockOutcome) -> Self {
        *self.fallback.lock() = outcome;
        self
    }

    /// Returns the number of times `execute` was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }

    /// Returns the number of times `on_error` was called.
    #[must_use]
    pub fn on_error_count(&self) -> usize {
        *self.on_error_count.lock()
    }
}

#[async_trait]
impl Command for MockCommand {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> CommandResult {
        *self.call_count.lock() += 1;
        let outcome = {
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| self.fallback.lock().clone())
        };

        match outcome {
            MockOutcome::Succeed => Ok(()),
            MockOutcome::Fault(fault) => Err(fault.into()),
            MockOutcome::Error(message) => Err(anyhow::anyhow!(message)),
            MockOutcome::Cancel(reason) => {
                ctx.cancellation_token().cancel(reason.clone());
                Err(anyhow::anyhow!("cancelled: {reason}"))
            }
        }
    }

    fn can_execute(&self, _ctx: &ExecutionContext) -> bool {
        self.enabled
    }

    fn required_state(&self) -> Option<&State> {
        self.required_state.as_ref()
    }

    fn next_state(&self) -> &State {
        &self.next_state
    }

    async fn on_error(&self, _ctx: &mut ExecutionContext, err: anyhow::Error) -> CommandResult {
        *self.on_error_count.lock() += 1;
        if self.recover {
            Ok(())
        } else {
            Err(err)
        }
    }

    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// A retry strategy that records the delay of every wait and returns
/// immediately.
#[derive(Debug, Default)]
pub struct RecordingRetryStrategy {
    delays: ExponentialBackoff,
    waits: Mutex<Vec<Duration>>,
}

impl RecordingRetryStrategy {
    /// Records delays computed by `backoff`.
    #[must_use]
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            delays: backoff,
            waits: Mutex::new(Vec::new()),
        }
    }

    /// Returns the recorded waits, in order.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }
}

#[async_trait]
impl RetryStrategy for RecordingRetryStrategy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.delays.delay_for(attempt)
    }

    async fn wait(&self, cancel: &CancellationToken, attempt: u32) -> Result<(), WaitCancelled> {
        if cancel.is_cancelled() {
            return Err(WaitCancelled);
        }
        self.waits.lock().push(self.delay_for(attempt));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::sample_context;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let mock = MockCommand::new("m", State::VALIDATED)
            .then(MockOutcome::Error("first".to_string()))
            .then(MockOutcome::Succeed)
            .otherwise(MockOutcome::Fault(PipelineError::fatal("X", "always")));
        let mut ctx = sample_context();

        assert!(mock.execute(&mut ctx).await.is_err());
        assert!(mock.execute(&mut ctx).await.is_ok());
        assert!(mock.execute(&mut ctx).await.is_err());
        assert!(mock.execute(&mut ctx).await.is_err());
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test]
    async fn test_cancel_outcome() {
        let mock = MockCommand::new("m", State::VALIDATED)
            .then(MockOutcome::Cancel("stop".to_string()));
        let mut ctx = sample_context();

        assert!(mock.execute(&mut ctx).await.is_err());
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_recording_strategy() {
        let strategy = RecordingRetryStrategy::default();
        let token = CancellationToken::new();

        strategy.wait(&token, 1).await.unwrap();
        strategy.wait(&token, 2).await.unwrap();
        assert_eq!(
            strategy.waits(),
            vec![Duration::from_millis(200), Duration::from_millis(400)]
        );

        token.cancel("stop");
        assert_eq!(strategy.wait(&token, 3).await, Err(WaitCancelled));
    }
}
