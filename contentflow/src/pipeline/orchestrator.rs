//! The pipeline orchestrator.

use super::{ErrorAction, ErrorHandler, PipelineBuilder, PipelineConfig, RetryStrategy};
use crate::cancellation::CancellationToken;
use crate::commands::Command;
use crate::context::{ExecutionContext, Job};
use crate::errors::{as_fault, codes, wrap_error, PipelineError, PipelineRunError};
use crate::events::{EventKind, EventSink, PipelineEvent};
use crate::observability::SpanTimer;
use crate::state::{State, StateMachine, TransitionTable};
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// The outcome of a run that ended in `completed` or a paused state.
#[derive(Debug)]
pub struct RunReport {
    /// The context, with every phase the run populated.
    pub context: ExecutionContext,
    /// The state the run ended in.
    pub final_state: State,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl RunReport {
    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.final_state == State::COMPLETED
    }

    /// Returns true if the run paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.final_state.is_paused()
    }
}

/// Why a step stopped without succeeding.
enum StepFailure {
    Cancelled,
    Error(anyhow::Error),
}

/// Drives an execution context through an ordered list of commands.
///
/// A `Pipeline` is immutable once built and can run many jobs
/// concurrently; each run owns its own context.
pub struct Pipeline {
    pub(super) config: PipelineConfig,
    pub(super) commands: Vec<Arc<dyn Command>>,
    pub(super) table: Arc<TransitionTable>,
    pub(super) initial_state: State,
    pub(super) error_handler: Arc<dyn ErrorHandler>,
    pub(super) retry_strategy: Arc<dyn RetryStrategy>,
    pub(super) event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.config.name)
            .field(
                "commands",
                &self.commands.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("initial_state", &self.initial_state)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Starts building a pipeline.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the commands, in execution order.
    #[must_use]
    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    /// Creates a fresh context for `job` over this pipeline's table.
    #[must_use]
    pub fn new_context(&self, job: Job) -> ExecutionContext {
        ExecutionContext::new(
            job,
            StateMachine::new(self.initial_state.clone(), self.table.clone()),
        )
    }

    /// Runs `job` to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the run ends in `failed`; the context is
    /// discarded. Use [`Pipeline::run`] to keep it.
    pub async fn execute(
        &self,
        cancel: Arc<CancellationToken>,
        job: Job,
    ) -> Result<RunReport, PipelineRunError> {
        let started = Instant::now();
        let mut ctx = self.new_context(job).with_cancellation(cancel);
        self.run(&mut ctx).await?;
        Ok(RunReport {
            final_state: ctx.current_state().clone(),
            context: ctx,
            duration: started.elapsed(),
        })
    }

    /// Runs the commands against a caller-owned context.
    ///
    /// Returns `Ok` when the run ends in `completed` or a paused state.
    ///
    /// # Errors
    ///
    /// Returns an error if the run ends in `failed`. The context is left in
    /// `failed` whenever possible.
    pub async fn run(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineRunError> {
        let span = info_span!(
            "pipeline_run",
            pipeline = %self.config.name,
            job_id = %ctx.job().id,
            run_id = %ctx.run_id(),
        );
        self.run_commands(ctx).instrument(span).await
    }

    async fn run_commands(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineRunError> {
        info!(state = %ctx.current_state(), commands = self.commands.len(), "Pipeline started");
        self.emit(
            self.event(ctx, EventKind::PipelineStarted)
                .with_data("state", ctx.current_state().as_str()),
        );

        for command in &self.commands {
            if ctx.is_cancelled() {
                return Err(self.cancel_run(ctx, command.name()));
            }

            if !command.can_execute(ctx) {
                debug!(step = command.name(), "Skipping command");
                continue;
            }

            if let Some(required) = command.required_state() {
                if required != ctx.current_state() {
                    let err = PipelineRunError::StateMismatch {
                        command: command.name().to_string(),
                        expected: required.clone(),
                        actual: ctx.current_state().clone(),
                    };
                    return Err(self.abort(ctx, err, Some(command.name())));
                }
            }

            let timer = SpanTimer::start(command.name());
            match self.execute_with_retry(command.as_ref(), ctx).await {
                Ok(()) => {
                    let next = command.next_state().clone();
                    if let Err(e) = ctx
                        .state_machine_mut()
                        .transition(next, format!("{} completed", command.name()))
                    {
                        return Err(self.abort(ctx, e.into(), Some(command.name())));
                    }
                    let duration_ms = timer.finish();
                    debug!(step = command.name(), state = %ctx.current_state(), duration_ms, "Step completed");
                    self.emit(
                        self.event(ctx, EventKind::StepCompleted)
                            .with_step(command.name())
                            .with_data("state", ctx.current_state().as_str())
                            .with_data("duration_ms", duration_ms),
                    );
                }
                Err(StepFailure::Cancelled) => {
                    return Err(self.cancel_run(ctx, command.name()));
                }
                Err(StepFailure::Error(err)) => {
                    let mut event = self
                        .event(ctx, EventKind::StepFailed)
                        .with_step(command.name())
                        .with_data("error", err.to_string())
                        .with_data("duration_ms", timer.finish());
                    if let Some(fault) = as_fault(&err) {
                        event = event.with_data("code", fault.code.as_str());
                    }
                    self.emit(event);

                    if self.handle_error(command.as_ref(), ctx, err).await?.is_break() {
                        return Ok(());
                    }
                }
            }

            if ctx.state_machine().is_final_state() {
                break;
            }
        }

        self.finish(ctx)
    }

    async fn execute_with_retry(
        &self,
        command: &dyn Command,
        ctx: &mut ExecutionContext,
    ) -> Result<(), StepFailure> {
        let retryable = command.is_retryable();
        let max_retries = match (retryable, command.max_retries()) {
            (false, _) => 0,
            (true, 0) => self.config.default_max_retries,
            (true, n) => n,
        };

        self.emit(
            self.event(ctx, EventKind::StepStarted)
                .with_step(command.name())
                .with_data("max_retries", max_retries),
        );

        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let delay = self.retry_strategy.delay_for(attempt);
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                self.emit(
                    self.event(ctx, EventKind::StepRetrying)
                        .with_step(command.name())
                        .with_data("attempt", attempt)
                        .with_data("delay_ms", delay_ms),
                );
                let cancel = ctx.cancellation_token().clone();
                if self.retry_strategy.wait(&cancel, attempt).await.is_err() {
                    return Err(StepFailure::Cancelled);
                }
            }

            match command.execute(ctx).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    let fault_allows_retry = as_fault(&err).map_or(true, |f| f.retryable);
                    if !retryable || !fault_allows_retry || attempt >= max_retries {
                        return Err(StepFailure::Error(err));
                    }
                    attempt += 1;
                    warn!(
                        step = command.name(),
                        attempt,
                        max_retries,
                        error = %err,
                        "Step failed, retrying"
                    );
                }
            }
        }
    }

    async fn handle_error(
        &self,
        command: &dyn Command,
        ctx: &mut ExecutionContext,
        err: anyhow::Error,
    ) -> Result<ControlFlow<()>, PipelineRunError> {
        let err = match command.on_error(ctx, err).await {
            Ok(()) => {
                info!(step = command.name(), "Step error handled by command");
                return Ok(ControlFlow::Continue(()));
            }
            Err(err) => err,
        };

        let mut fault = wrap_error(
            err,
            codes::UNKNOWN_ERROR,
            command.name(),
            format!("step '{}' failed", command.name()),
        );
        if fault.step.is_none() {
            fault.step = Some(command.name().to_string());
        }

        let action = self.error_handler.handle(&fault);
        debug!(step = command.name(), code = %fault.code, %action, "Error handler decided");

        match action {
            ErrorAction::Retry | ErrorAction::Fail => {
                self.mark_failed(ctx, &fault.to_string());
                error!(
                    step = command.name(),
                    code = %fault.code,
                    category = %fault.category,
                    error = %fault.message,
                    "Pipeline failed"
                );
                self.emit(self.failed_event(ctx, &fault.code, &fault.message, fault.step.as_deref()));
                Err(PipelineRunError::Fault(fault))
            }
            ErrorAction::Pause => {
                let target = if fault.is_no_resources() {
                    State::PAUSED_NO_RESOURCES
                } else {
                    State::PAUSED_FOR_VALIDATION
                };
                self.pause(ctx, target, &fault)
            }
            ErrorAction::Recover => self.pause(ctx, State::PAUSED_NO_RESOURCES, &fault),
            ErrorAction::Continue => {
                warn!(step = command.name(), code = %fault.code, "Continuing past failed step");
                Ok(ControlFlow::Continue(()))
            }
        }
    }

    fn pause(
        &self,
        ctx: &mut ExecutionContext,
        target: State,
        fault: &PipelineError,
    ) -> Result<ControlFlow<()>, PipelineRunError> {
        if let Err(e) = ctx.state_machine_mut().transition(target, fault.to_string()) {
            return Err(self.abort(ctx, e.into(), fault.step.as_deref()));
        }

        info!(state = %ctx.current_state(), code = %fault.code, "Pipeline paused");
        let mut event = self
            .event(ctx, EventKind::PipelinePaused)
            .with_data("state", ctx.current_state().as_str())
            .with_data("code", fault.code.as_str())
            .with_data("message", fault.message.as_str())
            .with_data("duration_ms", ctx.elapsed_ms());
        if let Some(step) = &fault.step {
            event = event.with_step(step.as_str());
        }
        self.emit(event);
        Ok(ControlFlow::Break(()))
    }

    fn finish(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineRunError> {
        let state = ctx.current_state().clone();
        if state == State::COMPLETED {
            info!(duration_ms = ctx.elapsed_ms(), "Pipeline completed");
            self.emit(
                self.event(ctx, EventKind::PipelineCompleted)
                    .with_data("state", state.as_str())
                    .with_data("duration_ms", ctx.elapsed_ms()),
            );
            Ok(())
        } else if state.is_paused() {
            info!(state = %state, "Pipeline paused");
            self.emit(
                self.event(ctx, EventKind::PipelinePaused)
                    .with_data("state", state.as_str())
                    .with_data("duration_ms", ctx.elapsed_ms()),
            );
            Ok(())
        } else {
            Err(self.abort(ctx, PipelineRunError::UnexpectedTerminalState(state), None))
        }
    }

    fn cancel_run(&self, ctx: &mut ExecutionContext, step: &str) -> PipelineRunError {
        let reason = ctx
            .cancellation_token()
            .reason()
            .unwrap_or_else(|| "cancelled".to_string());
        self.abort(ctx, PipelineRunError::Cancelled(reason), Some(step))
    }

    /// Forces `failed` and reports a run-level error.
    fn abort(
        &self,
        ctx: &mut ExecutionContext,
        err: PipelineRunError,
        step: Option<&str>,
    ) -> PipelineRunError {
        let message = err.to_string();
        self.mark_failed(ctx, &message);
        error!(step = step.unwrap_or("-"), code = err.code(), error = %message, "Pipeline failed");
        self.emit(self.failed_event(ctx, err.code(), &message, step));
        err
    }

    fn mark_failed(&self, ctx: &mut ExecutionContext, reason: &str) {
        if ctx.current_state() == &State::FAILED {
            return;
        }
        if let Err(e) = ctx.state_machine_mut().transition(State::FAILED, reason) {
            warn!(error = %e, "Could not move pipeline to failed");
        }
    }

    fn failed_event(
        &self,
        ctx: &ExecutionContext,
        code: &str,
        message: &str,
        step: Option<&str>,
    ) -> PipelineEvent {
        let mut event = self
            .event(ctx, EventKind::PipelineFailed)
            .with_data("state", ctx.current_state().as_str())
            .with_data("code", code)
            .with_data("message", message)
            .with_data("duration_ms", ctx.elapsed_ms());
        if let Some(step) = step {
            event = event.with_step(step);
        }
        event
    }

    fn event(&self, ctx: &ExecutionContext, kind: EventKind) -> PipelineEvent {
        PipelineEvent::new(kind, self.config.name.as_str(), ctx.job().id, ctx.run_id())
    }

    fn emit(&self, event: PipelineEvent) {
        let kind = event.kind;
        let sink = &self.event_sink;
        if std::panic::catch_unwind(AssertUnwindSafe(|| sink.try_emit(event))).is_err() {
            warn!(event_type = %kind, "Event sink panicked");
        }
    }
}
