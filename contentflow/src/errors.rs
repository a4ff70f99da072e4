//! Error types for the contentflow pipeline.
//!
//! Three families live here:
//!
//! - [`PipelineError`]: the typed fault a step raises. It carries a category,
//!   a machine-readable code and an explicit retry flag, so the orchestrator
//!   never has to infer retry eligibility from the concrete error type.
//! - [`PipelineRunError`]: what a pipeline run returns to its caller.
//! - [`PipelineValidationError`]: raised by the builder for malformed pipelines.

use crate::state::{State, StateMachineError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Machine-readable fault codes.
///
/// The code drives category classification in [`wrap_error`] and the choice
/// of paused state when a fault pauses a run.
pub mod codes {
    /// Fallback code for errors that were not raised as typed faults.
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

    /// A network call failed.
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    /// An external call timed out.
    pub const TIMEOUT: &str = "TIMEOUT";
    /// The remote side throttled the request.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    /// The AI provider is temporarily unavailable.
    pub const PROVIDER_UNAVAILABLE: &str = "PROVIDER_UNAVAILABLE";

    /// The topic pool for the site is exhausted.
    pub const NO_TOPICS_AVAILABLE: &str = "NO_TOPICS_AVAILABLE";
    /// No category could be selected for the topic.
    pub const NO_CATEGORIES_AVAILABLE: &str = "NO_CATEGORIES_AVAILABLE";

    /// The target site is inactive.
    pub const SITE_INACTIVE: &str = "SITE_INACTIVE";
    /// The site has no categories configured.
    pub const NO_CATEGORIES_CONFIGURED: &str = "NO_CATEGORIES_CONFIGURED";
    /// The job or site configuration is structurally invalid.
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
    /// The requested topic selection strategy is not known.
    pub const INVALID_STRATEGY: &str = "INVALID_STRATEGY";

    /// A command read a context phase that has not been populated.
    pub const MISSING_PHASE: &str = "MISSING_PHASE";
    /// A context phase was populated before its predecessor.
    pub const PHASE_OUT_OF_ORDER: &str = "PHASE_OUT_OF_ORDER";
    /// The run was cancelled by the caller.
    pub const CANCELLED: &str = "CANCELLED";
    /// An orchestration invariant was violated.
    pub const ORCHESTRATION_ERROR: &str = "ORCHESTRATION_ERROR";

    /// Returns true for codes of transient failures.
    #[must_use]
    pub fn is_transient(code: &str) -> bool {
        matches!(
            code,
            NETWORK_ERROR | TIMEOUT | RATE_LIMITED | PROVIDER_UNAVAILABLE
        )
    }

    /// Returns true for codes signalling that topics or categories ran out.
    #[must_use]
    pub fn is_no_resources(code: &str) -> bool {
        matches!(code, NO_TOPICS_AVAILABLE | NO_CATEGORIES_AVAILABLE)
    }

    /// Returns true for structural or configuration codes.
    #[must_use]
    pub fn is_structural(code: &str) -> bool {
        matches!(
            code,
            SITE_INACTIVE | NO_CATEGORIES_CONFIGURED | INVALID_CONFIG | INVALID_STRATEGY
        )
    }
}

/// The category of a fault, which selects the recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Unrecoverable within this run.
    Fatal,
    /// Transient; bounded automatic retry.
    Retryable,
    /// A missing external resource; the run pauses.
    Recoverable,
    /// A structural or business-rule violation; the run pauses for review.
    Validation,
}

impl ErrorCategory {
    /// Classifies a fault code.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        if codes::is_transient(code) {
            Self::Retryable
        } else if codes::is_no_resources(code) {
            Self::Recoverable
        } else if codes::is_structural(code) {
            Self::Validation
        } else {
            Self::Fatal
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Retryable => write!(f, "retryable"),
            Self::Recoverable => write!(f, "recoverable"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// A typed pipeline fault.
///
/// Faults are cheap to clone; the underlying cause is shared.
#[derive(Debug, Clone)]
pub struct PipelineError {
    /// The fault category.
    pub category: ErrorCategory,
    /// Machine-readable code, see [`codes`].
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// The step that raised the fault, if known.
    pub step: Option<String>,
    /// The error that caused this fault.
    pub cause: Option<Arc<anyhow::Error>>,
    /// Extra diagnostic key-value pairs.
    pub context: HashMap<String, String>,
    /// Whether the orchestrator may retry the step.
    pub retryable: bool,
}

impl PipelineError {
    /// Creates a fault with an explicit category.
    ///
    /// Only [`ErrorCategory::Retryable`] faults start out retry-eligible.
    #[must_use]
    pub fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            step: None,
            cause: None,
            context: HashMap::new(),
            retryable: category == ErrorCategory::Retryable,
        }
    }

    /// Creates a fatal fault.
    #[must_use]
    pub fn fatal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Fatal, code, message)
    }

    /// Creates a retry-eligible fault.
    #[must_use]
    pub fn retryable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Retryable, code, message)
    }

    /// Creates a recoverable fault.
    #[must_use]
    pub fn recoverable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Recoverable, code, message)
    }

    /// Creates a validation fault.
    #[must_use]
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    /// Sets the step name.
    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Sets the underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(Arc::new(cause.into()));
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Overrides retry eligibility.
    #[must_use]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Returns whether the step may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns true if this fault signals missing topics or categories.
    #[must_use]
    pub fn is_no_resources(&self) -> bool {
        codes::is_no_resources(&self.code)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(ref step) => write!(f, "[{}] {} (step: {step})", self.code, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

/// Wraps an arbitrary error into a typed fault.
///
/// An error that already is a [`PipelineError`] comes back unchanged, so
/// wrapping never nests. Otherwise the new fault's category is derived from
/// `code` and the original error is kept as the cause.
#[must_use]
pub fn wrap_error(
    err: anyhow::Error,
    code: &str,
    step: &str,
    message: impl Into<String>,
) -> PipelineError {
    match err.downcast::<PipelineError>() {
        Ok(fault) => fault,
        Err(err) => PipelineError::new(ErrorCategory::from_code(code), code, message)
            .with_step(step)
            .with_cause(err),
    }
}

/// Returns the fault inside an opaque error, if there is one.
#[must_use]
pub fn as_fault(err: &anyhow::Error) -> Option<&PipelineError> {
    err.downcast_ref::<PipelineError>()
}

/// Error returned by a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineRunError {
    /// The caller cancelled the run.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// A step failed and the error handler chose to fail the run.
    #[error("{0}")]
    Fault(#[from] PipelineError),

    /// A command was reached while the machine was in the wrong state.
    #[error("Command '{command}' requires state '{expected}' but the pipeline is in '{actual}'")]
    StateMismatch {
        /// The command name.
        command: String,
        /// The state the command requires.
        expected: State,
        /// The state the machine was in.
        actual: State,
    },

    /// An internal state transition was rejected.
    #[error(transparent)]
    Transition(#[from] StateMachineError),

    /// The run stopped in a state that is neither completed nor paused.
    #[error("Pipeline ended in unexpected state '{0}'")]
    UnexpectedTerminalState(State),
}

impl PipelineRunError {
    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns the fault, if the run failed because of one.
    #[must_use]
    pub fn fault(&self) -> Option<&PipelineError> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Returns a fault code describing this error.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Cancelled(_) => codes::CANCELLED,
            Self::Fault(fault) => &fault.code,
            Self::StateMismatch { .. } | Self::Transition(_) | Self::UnexpectedTerminalState(_) => {
                codes::ORCHESTRATION_ERROR
            }
        }
    }
}

/// Error raised when pipeline construction fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineValidationError {
    /// No commands were registered.
    #[error("Pipeline has no commands")]
    Empty,

    /// Two commands share a name.
    #[error("Duplicate command name '{0}'")]
    DuplicateCommand(String),

    /// A command's transition is not in the table.
    #[error("Command '{command}' moves {from} -> {to}, which the transition table does not allow")]
    IllegalStep {
        /// The command name.
        command: String,
        /// The required state, or `*` when the command accepts any state.
        from: String,
        /// The state the command moves to.
        to: State,
    },
}

impl PipelineValidationError {
    /// Returns a stable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "PIPELINE-EMPTY",
            Self::DuplicateCommand(_) => "PIPELINE-DUPLICATE",
            Self::IllegalStep { .. } => "PIPELINE-ILLEGAL-STEP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_constructors_tag_category() {
        assert_eq!(PipelineError::fatal("X", "x").category, ErrorCategory::Fatal);
        assert_eq!(
            PipelineError::recoverable(codes::NO_TOPICS_AVAILABLE, "x").category,
            ErrorCategory::Recoverable
        );
        assert_eq!(
            PipelineError::validation(codes::SITE_INACTIVE, "x").category,
            ErrorCategory::Validation
        );

        let retryable = PipelineError::retryable(codes::TIMEOUT, "slow");
        assert_eq!(retryable.category, ErrorCategory::Retryable);
        assert!(retryable.is_retryable());
        assert!(!PipelineError::fatal("X", "x").is_retryable());
    }

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code(codes::NETWORK_ERROR), ErrorCategory::Retryable);
        assert_eq!(ErrorCategory::from_code(codes::TIMEOUT), ErrorCategory::Retryable);
        assert_eq!(
            ErrorCategory::from_code(codes::NO_CATEGORIES_AVAILABLE),
            ErrorCategory::Recoverable
        );
        assert_eq!(
            ErrorCategory::from_code(codes::NO_CATEGORIES_CONFIGURED),
            ErrorCategory::Validation
        );
        assert_eq!(ErrorCategory::from_code("SOMETHING_ELSE"), ErrorCategory::Fatal);
    }

    #[test]
    fn test_wrap_error_is_idempotent() {
        let fault = PipelineError::validation(codes::SITE_INACTIVE, "site is inactive")
            .with_step("validate_job")
            .with_context_entry("site", "blog");

        let wrapped = wrap_error(anyhow::Error::new(fault.clone()), codes::NETWORK_ERROR, "other", "wrapped");

        assert_eq!(wrapped.code, fault.code);
        assert_eq!(wrapped.category, fault.category);
        assert_eq!(wrapped.step, fault.step);
        assert_eq!(wrapped.message, fault.message);
        assert_eq!(wrapped.context, fault.context);
        assert!(wrapped.cause.is_none());
    }

    #[test]
    fn test_wrap_error_classifies_plain_errors() {
        let err = anyhow::anyhow!("connection reset");
        let fault = wrap_error(err, codes::NETWORK_ERROR, "generate", "provider call failed");

        assert_eq!(fault.category, ErrorCategory::Retryable);
        assert!(fault.is_retryable());
        assert_eq!(fault.step.as_deref(), Some("generate"));
        assert!(fault.cause.is_some());

        let source = std::error::Error::source(&fault).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_display_includes_step() {
        let fault = PipelineError::fatal("BOOM", "exploded").with_step("publish");
        assert_eq!(fault.to_string(), "[BOOM] exploded (step: publish)");
        assert_eq!(PipelineError::fatal("BOOM", "exploded").to_string(), "[BOOM] exploded");
    }

    #[test]
    fn test_run_error_codes() {
        assert_eq!(PipelineRunError::Cancelled("stop".into()).code(), codes::CANCELLED);
        assert!(PipelineRunError::Cancelled("stop".into()).is_cancelled());

        let err = PipelineRunError::from(PipelineError::fatal("BOOM", "x"));
        assert_eq!(err.code(), "BOOM");
        assert!(err.fault().is_some());

        let err = PipelineRunError::UnexpectedTerminalState(State::GENERATED);
        assert_eq!(err.code(), codes::ORCHESTRATION_ERROR);
        assert!(err.to_string().contains("generated"));
    }

    #[test]
    fn test_validation_error_code() {
        assert_eq!(PipelineValidationError::Empty.code(), "PIPELINE-EMPTY");
        let err = PipelineValidationError::DuplicateCommand("validate".into());
        assert_eq!(err.code(), "PIPELINE-DUPLICATE");
        assert!(err.to_string().contains("'validate'"));
    }
}
