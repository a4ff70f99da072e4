//! Execution context for pipeline runs.
//!
//! This module provides:
//! - The immutable [`Job`] descriptor
//! - Phase records populated in order as commands complete
//! - The per-run [`ExecutionContext`] carrying state machine, metadata and phases

mod execution;
mod job;
mod phases;

pub use execution::ExecutionContext;
pub use job::{Job, DEFAULT_STRATEGY};
pub use phases::{
    Category, ExecutionPhase, ExecutionRecord, GenerationPhase, Phase, Prompt, Provider,
    PublicationPhase, PublishedArticle, SelectionPhase, Site, TokenUsage, Topic, TopicPair,
    ValidatedPhase,
};
