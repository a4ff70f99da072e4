//! The transition table: which state may follow which.

use super::State;
use std::collections::{BTreeMap, BTreeSet};

/// A fixed directed graph of legal state transitions.
///
/// States with no outgoing transitions are final. Tables built through
/// [`TransitionTableBuilder`] always let every non-final state move to
/// `failed` and to both paused states, so a run can stop from anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    successors: BTreeMap<State, BTreeSet<State>>,
}

impl TransitionTable {
    /// Starts a new table builder.
    #[must_use]
    pub fn builder() -> TransitionTableBuilder {
        TransitionTableBuilder::default()
    }

    /// The built-in content workflow:
    /// `initialized → validated → topic_selected → category_selected →
    /// execution_created → generated → published → completed`.
    #[must_use]
    pub fn content_workflow() -> Self {
        Self::linear(&[
            State::INITIALIZED,
            State::VALIDATED,
            State::TOPIC_SELECTED,
            State::CATEGORY_SELECTED,
            State::EXECUTION_CREATED,
            State::GENERATED,
            State::PUBLISHED,
            State::COMPLETED,
        ])
    }

    /// Builds a table that chains the given states in order.
    #[must_use]
    pub fn linear(states: &[State]) -> Self {
        states
            .windows(2)
            .fold(Self::builder(), |builder, pair| {
                builder.allow(pair[0].clone(), pair[1].clone())
            })
            .build()
    }

    /// Returns true if `from → to` is legal.
    #[must_use]
    pub fn is_legal(&self, from: &State, to: &State) -> bool {
        self.successors
            .get(from)
            .is_some_and(|targets| targets.contains(to))
    }

    /// Returns the legal successors of `from`.
    pub fn successors(&self, from: &State) -> impl Iterator<Item = &State> {
        self.successors.get(from).into_iter().flatten()
    }

    /// Returns true if `state` has no outgoing transitions.
    #[must_use]
    pub fn is_final(&self, state: &State) -> bool {
        self.successors.get(state).map_or(true, BTreeSet::is_empty)
    }

    /// Returns true if the table mentions `state`.
    #[must_use]
    pub fn contains(&self, state: &State) -> bool {
        self.successors.contains_key(state)
    }

    /// Returns every state the table knows about.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.successors.keys()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::content_workflow()
    }
}

/// Builder for [`TransitionTable`].
#[derive(Debug, Clone, Default)]
pub struct TransitionTableBuilder {
    edges: BTreeMap<State, BTreeSet<State>>,
}

impl TransitionTableBuilder {
    /// Allows `from → to`.
    #[must_use]
    pub fn allow(mut self, from: impl Into<State>, to: impl Into<State>) -> Self {
        let to = to.into();
        self.edges.entry(to.clone()).or_default();
        self.edges.entry(from.into()).or_default().insert(to);
        self
    }

    /// Builds the table.
    ///
    /// Every state with at least one outgoing edge also gets edges to
    /// `failed` and both paused states.
    #[must_use]
    pub fn build(mut self) -> TransitionTable {
        let stops = [
            State::FAILED,
            State::PAUSED_FOR_VALIDATION,
            State::PAUSED_NO_RESOURCES,
        ];

        for stop in &stops {
            self.edges.entry(stop.clone()).or_default();
        }

        for (from, targets) in &mut self.edges {
            if targets.is_empty() {
                continue;
            }
            for stop in &stops {
                if stop != from {
                    targets.insert(stop.clone());
                }
            }
        }

        TransitionTable {
            successors: self.edges,
        }
    }
}
