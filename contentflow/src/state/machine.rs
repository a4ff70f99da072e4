//! Per-run state machine with transition history.

use super::{State, TransitionTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised by [`StateMachine`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateMachineError {
    /// The target is not a legal successor of the current state.
    #[error("Invalid state transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// The current state.
        from: State,
        /// The rejected target.
        to: State,
    },
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// The state left.
    pub from: State,
    /// The state entered.
    pub to: State,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
    /// Why the change happened.
    pub reason: String,
}

/// The state of one pipeline run.
///
/// [`StateMachine::transition`] is the only mutator and it never bypasses the
/// transition table.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: State,
    table: Arc<TransitionTable>,
    history: Vec<Transition>,
}

impl StateMachine {
    /// Creates a machine in `initial`.
    #[must_use]
    pub fn new(initial: State, table: Arc<TransitionTable>) -> Self {
        Self {
            current: initial,
            table,
            history: Vec::new(),
        }
    }

    /// Creates a machine over the built-in content workflow.
    #[must_use]
    pub fn content_workflow() -> Self {
        Self::new(State::INITIALIZED, Arc::new(TransitionTable::content_workflow()))
    }

    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> &State {
        &self.current
    }

    /// Returns true if `to` is a legal successor of the current state.
    #[must_use]
    pub fn can_transition(&self, to: &State) -> bool {
        self.table.is_legal(&self.current, to)
    }

    /// Moves to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`StateMachineError::InvalidTransition`] and leaves the state
    /// unchanged if `to` is not a legal successor.
    pub fn transition(&mut self, to: State, reason: impl Into<String>) -> Result<(), StateMachineError> {
        if !self.can_transition(&to) {
            return Err(StateMachineError::InvalidTransition {
                from: self.current.clone(),
                to,
            });
        }

        let reason = reason.into();
        debug!(from = %self.current, to = %to, reason = %reason, "State transition");

        let from = std::mem::replace(&mut self.current, to.clone());
        self.history.push(Transition {
            from,
            to,
            timestamp: Utc::now(),
            reason,
        });
        Ok(())
    }

    /// Returns every transition made so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Returns true if the current state has no outgoing transitions.
    #[must_use]
    pub fn is_final_state(&self) -> bool {
        self.table.is_final(&self.current)
    }

    /// Returns true if the current state is one of the paused states.
    #[must_use]
    pub fn is_paused_state(&self) -> bool {
        self.current.is_paused()
    }

    /// Returns the transition table.
    #[must_use]
    pub fn table(&self) -> &Arc<TransitionTable> {
        &self.table
    }
}
