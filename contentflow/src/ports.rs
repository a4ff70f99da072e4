//! Interfaces to collaborators that live outside the pipeline core.
//!
//! Concrete implementations (repositories, AI clients, CMS publishers) are
//! supplied by the command layer; the core only needs the handles that
//! appear inside execution context phases.

use crate::context::{Site, TopicPair};
use async_trait::async_trait;
use std::fmt::Debug;

/// A topic selection strategy.
///
/// Resolved during validation and stored on the validated phase so later
/// commands can select topics without knowing which strategy the job asked
/// for. Implementations should return a recoverable
/// [`NO_TOPICS_AVAILABLE`](crate::errors::codes::NO_TOPICS_AVAILABLE) fault
/// when the site's pool is exhausted.
#[async_trait]
pub trait TopicStrategy: Send + Sync + Debug {
    /// Returns the strategy name.
    fn name(&self) -> &str;

    /// Selects the next topic pair for a site.
    async fn select(&self, site: &Site) -> anyhow::Result<TopicPair>;
}
