//! The mutable carrier object passed through every command of a run.

use super::{
    ExecutionPhase, GenerationPhase, Job, Phase, PublicationPhase, SelectionPhase, ValidatedPhase,
};
use crate::cancellation::CancellationToken;
use crate::errors::{codes, PipelineError};
use crate::state::{State, StateMachine};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

fn missing_phase(phase: Phase) -> PipelineError {
    PipelineError::fatal(
        codes::MISSING_PHASE,
        format!("{phase} phase has not been populated"),
    )
    .with_context_entry("phase", phase.to_string())
}

macro_rules! phase_accessors {
    ($field:ident: $ty:ty, $phase:expr, $has:ident, $require:ident, $set:ident) => {
        #[doc = concat!("Returns true if the `", stringify!($field), "` phase is populated.")]
        #[must_use]
        pub fn $has(&self) -> bool {
            self.$field.is_some()
        }

        #[doc = concat!("Returns the `", stringify!($field), "` phase, if populated.")]
        #[must_use]
        pub fn $field(&self) -> Option<&$ty> {
            self.$field.as_ref()
        }

        #[doc = concat!("Returns the `", stringify!($field), "` phase or a fatal, non-retryable `MISSING_PHASE` fault.")]
        pub fn $require(&self) -> Result<&$ty, PipelineError> {
            self.$field.as_ref().ok_or_else(|| missing_phase($phase))
        }

        #[doc = concat!("Populates the `", stringify!($field), "` phase.")]
        ///
        /// # Errors
        ///
        /// Returns a fatal `PHASE_OUT_OF_ORDER` fault if the preceding phase
        /// is not populated yet.
        pub fn $set(&mut self, value: $ty) -> Result<(), PipelineError> {
            self.check_predecessor($phase)?;
            self.$field = Some(value);
            Ok(())
        }
    };
}

/// The context of one pipeline run.
///
/// Owned exclusively by the run; commands receive it mutably one at a time.
#[derive(Debug)]
pub struct ExecutionContext {
    job: Job,
    run_id: Uuid,
    machine: StateMachine,
    started_at: DateTime<Utc>,
    started: Instant,
    metadata: HashMap<String, serde_json::Value>,
    cancel: Arc<CancellationToken>,
    validated: Option<ValidatedPhase>,
    selection: Option<SelectionPhase>,
    execution: Option<ExecutionPhase>,
    generation: Option<GenerationPhase>,
    publication: Option<PublicationPhase>,
}

impl ExecutionContext {
    /// Creates a context for `job` driven by `machine`.
    #[must_use]
    pub fn new(job: Job, machine: StateMachine) -> Self {
        Self {
            job,
            run_id: Uuid::new_v4(),
            machine,
            started_at: Utc::now(),
            started: Instant::now(),
            metadata: HashMap::new(),
            cancel: Arc::new(CancellationToken::new()),
            validated: None,
            selection: None,
            execution: None,
            generation: None,
            publication: None,
        }
    }

    /// Creates a context over the built-in content workflow.
    #[must_use]
    pub fn for_content_workflow(job: Job) -> Self {
        Self::new(job, StateMachine::content_workflow())
    }

    /// Attaches the caller's cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the job.
    #[must_use]
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Returns the ID of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns when the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the time elapsed since the run started, in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the state machine.
    #[must_use]
    pub fn state_machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Returns the state machine mutably.
    pub fn state_machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    /// Returns the current state.
    #[must_use]
    pub fn current_state(&self) -> &State {
        self.machine.current()
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Returns true if the caller cancelled the run.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Gets a metadata value.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Sets a metadata value, returning the previous one.
    pub fn set_metadata(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.metadata.insert(key.into(), value)
    }

    phase_accessors!(validated: ValidatedPhase, Phase::Validated, has_validated, require_validated, set_validated);
    phase_accessors!(selection: SelectionPhase, Phase::Selection, has_selection, require_selection, set_selection);
    phase_accessors!(execution: ExecutionPhase, Phase::Execution, has_execution, require_execution, set_execution);
    phase_accessors!(generation: GenerationPhase, Phase::Generation, has_generation, require_generation, set_generation);
    phase_accessors!(publication: PublicationPhase, Phase::Publication, has_publication, require_publication, set_publication);

    /// Returns true if `phase` is populated.
    #[must_use]
    pub fn has_phase(&self, phase: Phase) -> bool {
        match phase {
            Phase::Validated => self.has_validated(),
            Phase::Selection => self.has_selection(),
            Phase::Execution => self.has_execution(),
            Phase::Generation => self.has_generation(),
            Phase::Publication => self.has_publication(),
        }
    }

    fn check_predecessor(&self, phase: Phase) -> Result<(), PipelineError> {
        match phase.predecessor() {
            Some(previous) if !self.has_phase(previous) => Err(PipelineError::fatal(
                codes::PHASE_OUT_OF_ORDER,
                format!("cannot populate {phase} phase before {previous} phase"),
            )
            .with_context_entry("phase", phase.to_string())
            .with_context_entry("missing", previous.to_string())),
            _ => Ok(()),
        }
    }
}
