//! Pipeline builder with validation.

use super::{
    DefaultErrorHandler, ErrorHandler, ExponentialBackoff, Pipeline, PipelineConfig,
    RetryStrategy,
};
use crate::commands::Command;
use crate::errors::PipelineValidationError;
use crate::events::{default_sink, EventSink};
use crate::state::{State, TransitionTable};
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Unset collaborators fall back to [`DefaultErrorHandler`], an
/// [`ExponentialBackoff`] built from the config, and the process-wide
/// default event sink.
#[derive(Clone)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    commands: Vec<Arc<dyn Command>>,
    table: TransitionTable,
    initial_state: State,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    retry_strategy: Option<Arc<dyn RetryStrategy>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("commands", &self.command_names())
            .field("initial_state", &self.initial_state)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates a builder with a default config.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(PipelineConfig::default().with_name(name))
    }

    /// Creates a builder from a loaded config.
    #[must_use]
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            config,
            commands: Vec::new(),
            table: TransitionTable::content_workflow(),
            initial_state: State::INITIALIZED,
            error_handler: None,
            retry_strategy: None,
            event_sink: None,
        }
    }

    /// Appends a command.
    #[must_use]
    pub fn command(mut self, command: Arc<dyn Command>) -> Self {
        self.commands.push(command);
        self
    }

    /// Appends several commands.
    #[must_use]
    pub fn commands<I>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Command>>,
    {
        self.commands.extend(commands);
        self
    }

    /// Replaces the transition table.
    #[must_use]
    pub fn table(mut self, table: TransitionTable) -> Self {
        self.table = table;
        self
    }

    /// Sets the state each run starts in.
    #[must_use]
    pub fn initial_state(mut self, state: impl Into<State>) -> Self {
        self.initial_state = state.into();
        self
    }

    /// Sets the error handler.
    #[must_use]
    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Sets the retry strategy.
    #[must_use]
    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    fn command_names(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.name().to_string()).collect()
    }

    fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.commands.is_empty() {
            return Err(PipelineValidationError::Empty);
        }

        let mut seen = HashSet::new();
        for command in &self.commands {
            if !seen.insert(command.name()) {
                return Err(PipelineValidationError::DuplicateCommand(
                    command.name().to_string(),
                ));
            }
        }

        for command in &self.commands {
            let next = command.next_state();
            let legal = match command.required_state() {
                Some(required) => self.table.is_legal(required, next),
                None => self.table.contains(next),
            };
            if !legal {
                return Err(PipelineValidationError::IllegalStep {
                    command: command.name().to_string(),
                    from: command
                        .required_state()
                        .map_or_else(|| "*".to_string(), ToString::to_string),
                    to: next.clone(),
                });
            }
        }

        Ok(())
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no commands, two commands share a name,
    /// or a command's transition is not legal in the table.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        self.validate()?;

        let retry_strategy = self
            .retry_strategy
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::from_config(self.config.retry)));

        Ok(Pipeline {
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(DefaultErrorHandler)),
            retry_strategy,
            event_sink: self.event_sink.unwrap_or_else(default_sink),
            commands: self.commands,
            table: Arc::new(self.table),
            initial_state: self.initial_state,
            config: self.config,
        })
    }
}
