//! Workflow states and the state machine that guards them.
//!
//! This module provides:
//! - [`State`], an opaque string tag with the built-in content workflow states
//! - [`TransitionTable`], the fixed graph of legal transitions
//! - [`StateMachine`], the per-run current state plus transition history

mod machine;
mod table;

pub use machine::{StateMachine, StateMachineError, Transition};
pub use table::{TransitionTable, TransitionTableBuilder};

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A workflow state tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(Cow<'static, str>);

impl State {
    /// The state every run starts in.
    pub const INITIALIZED: Self = Self(Cow::Borrowed("initialized"));
    /// The job and its site passed validation.
    pub const VALIDATED: Self = Self(Cow::Borrowed("validated"));
    /// A topic pair was chosen.
    pub const TOPIC_SELECTED: Self = Self(Cow::Borrowed("topic_selected"));
    /// Categories were chosen for the topic.
    pub const CATEGORY_SELECTED: Self = Self(Cow::Borrowed("category_selected"));
    /// The execution record was persisted.
    pub const EXECUTION_CREATED: Self = Self(Cow::Borrowed("execution_created"));
    /// Content was generated.
    pub const GENERATED: Self = Self(Cow::Borrowed("generated"));
    /// Content was published.
    pub const PUBLISHED: Self = Self(Cow::Borrowed("published"));
    /// The run finished successfully.
    pub const COMPLETED: Self = Self(Cow::Borrowed("completed"));
    /// The run failed.
    pub const FAILED: Self = Self(Cow::Borrowed("failed"));
    /// The run stopped pending manual validation.
    pub const PAUSED_FOR_VALIDATION: Self = Self(Cow::Borrowed("paused_for_validation"));
    /// The run stopped because topics or categories ran out.
    pub const PAUSED_NO_RESOURCES: Self = Self(Cow::Borrowed("paused_no_resources"));

    /// Creates a state from a static string.
    #[must_use]
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// Creates a state from any string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    /// Returns the tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for either paused state.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self == Self::PAUSED_FOR_VALIDATION || *self == Self::PAUSED_NO_RESOURCES
    }

    /// Returns true for the states that end every run: completed, failed and
    /// both paused states.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        *self == Self::COMPLETED || *self == Self::FAILED || self.is_paused()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for State {
    fn from(tag: &'static str) -> Self {
        Self::from_static(tag)
    }
}

impl From<String> for State {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

impl AsRef<str> for State {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
