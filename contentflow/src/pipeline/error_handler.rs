//! Mapping faults to recovery actions.

use crate::errors::{ErrorCategory, PipelineError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the orchestrator does with a command failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    /// Treated as [`ErrorAction::Fail`]; retries have already happened.
    Retry,
    /// End the run in `failed` and return the fault.
    Fail,
    /// End the run in a paused state chosen from the fault code.
    Pause,
    /// End the run in `paused_no_resources`.
    Recover,
    /// Ignore the failure and move on to the next command.
    Continue,
}

impl fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "retry"),
            Self::Fail => write!(f, "fail"),
            Self::Pause => write!(f, "pause"),
            Self::Recover => write!(f, "recover"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// Maps a fault to an [`ErrorAction`].
#[cfg_attr(test, mockall::automock)]
pub trait ErrorHandler: Send + Sync {
    /// Decides what to do about `error`.
    fn handle(&self, error: &PipelineError) -> ErrorAction;
}

/// Maps each category to its default action.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl DefaultErrorHandler {
    /// Returns the default action for a category.
    #[must_use]
    pub fn action_for(category: ErrorCategory) -> ErrorAction {
        match category {
            ErrorCategory::Fatal => ErrorAction::Fail,
            ErrorCategory::Retryable => ErrorAction::Retry,
            ErrorCategory::Recoverable => ErrorAction::Recover,
            ErrorCategory::Validation => ErrorAction::Pause,
        }
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, error: &PipelineError) -> ErrorAction {
        Self::action_for(error.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;

    #[test]
    fn test_default_mapping() {
        let handler = DefaultErrorHandler;
        assert_eq!(handler.handle(&PipelineError::fatal("X", "x")), ErrorAction::Fail);
        assert_eq!(
            handler.handle(&PipelineError::retryable(codes::TIMEOUT, "slow")),
            ErrorAction::Retry
        );
        assert_eq!(
            handler.handle(&PipelineError::recoverable(codes::NO_TOPICS_AVAILABLE, "empty")),
            ErrorAction::Recover
        );
        assert_eq!(
            handler.handle(&PipelineError::validation(codes::SITE_INACTIVE, "inactive")),
            ErrorAction::Pause
        );
    }

    #[test]
    fn test_mock_handler() {
        let mut mock = MockErrorHandler::new();
        mock.expect_handle()
            .withf(|e| e.code == "CUSTOM")
            .times(1)
            .return_const(ErrorAction::Continue);

        assert_eq!(mock.handle(&PipelineError::fatal("CUSTOM", "c")), ErrorAction::Continue);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(ErrorAction::Recover.to_string(), "recover");
        assert_eq!(
            serde_json::to_value(ErrorAction::Continue).unwrap(),
            serde_json::json!("continue")
        );
    }
}
